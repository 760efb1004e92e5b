//! Schema lifecycle and cleanup

use crate::database::FingerprintDatabase;
use crate::error::Result;

impl FingerprintDatabase {
    /// Create any missing tables and indexes
    pub async fn create_all(&self) -> Result<()> {
        self.driver.create_schema().await
    }

    /// Drop both tables
    pub async fn drop_all(&self) -> Result<()> {
        log::warn!("Dropping songs and fingerprints tables");
        self.driver.drop_schema().await
    }

    /// Startup entry point: create missing tables, then clear out
    /// interrupted imports
    pub async fn setup(&self) -> Result<()> {
        self.create_all().await?;
        self.purge_abandoned_songs().await?;
        Ok(())
    }

    /// Drop and recreate both tables
    ///
    /// Runs as a single unit on the backend: either both tables come back
    /// empty or the error is returned and nothing changed.
    pub async fn reset_all(&self) -> Result<()> {
        log::warn!("Resetting fingerprint database");
        self.driver.reset_schema().await
    }

    /// Delete every song still pending, with any fingerprints already
    /// written for it. Fingerprinted songs are never touched.
    pub async fn purge_abandoned_songs(&self) -> Result<u64> {
        let purged = self.driver.delete_unfingerprinted_songs().await?;
        if purged > 0 {
            log::info!("Purged {} abandoned songs", purged);
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{sqlite_database, SHA1_A, SHA1_B};

    #[tokio::test]
    async fn test_purge_removes_pending_song_and_its_fingerprints() {
        let db = sqlite_database().await;

        let pending = db.register_song("interrupted", SHA1_A).await.unwrap();
        db.insert_fingerprints(pending, vec![("01", 1u32), ("02", 2), ("03", 3)])
            .await
            .unwrap();

        let complete = db.register_song("silent", SHA1_B).await.unwrap();
        db.mark_fingerprinted(complete).await.unwrap();

        assert_eq!(db.purge_abandoned_songs().await.unwrap(), 1);

        assert!(db.song_by_id(pending).await.unwrap().is_none());
        assert_eq!(db.count_fingerprints().await.unwrap(), 0);
        // Zero fingerprints but fingerprinted: kept
        assert!(db.song_by_id(complete).await.unwrap().is_some());
        assert_eq!(db.count_fingerprinted_songs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_setup_is_idempotent_and_purges() {
        let db = sqlite_database().await;
        db.register_song("half", SHA1_A).await.unwrap();

        db.setup().await.unwrap();
        db.setup().await.unwrap();

        assert!(db.query_hash("01").await.unwrap().is_empty());
        assert_eq!(db.purge_abandoned_songs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_all_clears_everything() {
        let db = sqlite_database().await;
        let id = db.register_song("song", SHA1_A).await.unwrap();
        db.insert_fingerprints(id, vec![("AA", 1u32)]).await.unwrap();
        db.mark_fingerprinted(id).await.unwrap();

        db.reset_all().await.unwrap();

        assert_eq!(db.count_fingerprints().await.unwrap(), 0);
        assert_eq!(db.count_fingerprinted_songs().await.unwrap(), 0);
        // Tables are usable straight away
        db.register_song("song", SHA1_A).await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_all_then_create_all() {
        let db = sqlite_database().await;
        db.drop_all().await.unwrap();
        assert!(db.count_fingerprints().await.is_err());

        db.create_all().await.unwrap();
        assert_eq!(db.count_fingerprints().await.unwrap(), 0);
    }
}
