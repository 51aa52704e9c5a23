//! Team resource manager.
//!
//! Coordinates member rows in the resource store with their photos in the
//! blob store. A photo is always uploaded before the row that points at it is
//! written, and a row is always deleted before the photo it points at.
//!
//! Two inconsistencies are accepted and only logged: replacing a photo leaves
//! the previous object in place, and an insert that fails after its upload
//! leaves the uploaded object behind.

use std::sync::Arc;

use crate::db::ResourceStore;
use crate::errors::AppError;
use crate::models::{MemberRecord, MemberUpdate, NewMember, PhotoUpload, TeamMember};
use crate::storage::{key_from_public_url, photo_key, BlobStore, UploadOptions};

/// Create, update, delete and list operations over team members.
#[derive(Clone)]
pub struct TeamService {
    resources: Arc<dyn ResourceStore>,
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl TeamService {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        blobs: Arc<dyn BlobStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            resources,
            blobs,
            bucket: bucket.into(),
        }
    }

    /// All members, oldest first.
    pub async fn list(&self) -> Result<Vec<TeamMember>, AppError> {
        self.resources.list_members().await
    }

    pub async fn get(&self, id: i64) -> Result<TeamMember, AppError> {
        self.resources
            .get_member(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Upload the photo, then insert the row pointing at it.
    pub async fn create(&self, member: NewMember) -> Result<TeamMember, AppError> {
        let (key, photo_url) = self.store_photo(&member.photo, false).await?;

        let record = MemberRecord {
            name: member.name,
            role: member.role,
            category: member.category,
            term: member.term,
            description: member.description,
            photo_url: Some(photo_url),
        };

        match self.resources.insert_member(&record).await {
            Ok(created) => {
                tracing::info!(id = created.id, name = %created.name, "Team member created");
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %key,
                    "Insert failed after photo upload; object left orphaned"
                );
                Err(e)
            }
        }
    }

    /// Apply the supplied fields, uploading a replacement photo first if one is given.
    ///
    /// The previous photo object is not removed.
    pub async fn update(&self, id: i64, update: MemberUpdate) -> Result<TeamMember, AppError> {
        let existing = self.get(id).await?;

        let mut patch = update.patch;
        if let Some(photo) = &update.photo {
            let (_, photo_url) = self.store_photo(photo, true).await?;
            patch.photo_url = Some(photo_url);
        }

        if patch.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .resources
            .update_member(id, &patch)
            .await?
            .ok_or_else(|| not_found(id))?;

        if patch.photo_url.is_some() {
            tracing::info!(
                id,
                previous_photo = existing.photo_url.as_deref().unwrap_or("none"),
                "Team member photo replaced; previous object retained"
            );
        }
        tracing::info!(id, "Team member updated");
        Ok(updated)
    }

    /// Delete the row, then best-effort remove its photo.
    ///
    /// Failure to remove the photo is logged and does not fail the call.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let existing = self.get(id).await?;

        if self.resources.delete_member(id).await? == 0 {
            return Err(not_found(id));
        }
        tracing::info!(id, "Team member deleted");

        if let Some(url) = existing.photo_url.as_deref() {
            match key_from_public_url(url) {
                Some(key) => {
                    if let Err(e) = self.blobs.remove(&self.bucket, &[key.to_string()]).await {
                        tracing::warn!(id, key, error = %e, "Storage delete warning");
                    }
                }
                None => tracing::warn!(id, url, "Photo URL has no object key; nothing removed"),
            }
        }

        Ok(())
    }

    async fn store_photo(
        &self,
        photo: &PhotoUpload,
        overwrite: bool,
    ) -> Result<(String, String), AppError> {
        let key = photo_key(&photo.file_name);
        let options = UploadOptions {
            overwrite,
            content_type: photo.content_type.clone(),
        };

        self.blobs
            .upload(&self.bucket, &key, photo.bytes.clone(), options)
            .await
            .map_err(|e| match e {
                AppError::Upload(_) => e,
                other => AppError::Upload(other.message()),
            })?;

        let url = self.blobs.public_url(&self.bucket, &key);
        Ok((key, url))
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Member {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::{MemberPatch, MemberRecord};
    use crate::storage::LocalBlobStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const BUCKET: &str = "team-photos";

    /// Blob store double that can be told to fail uploads or removals.
    struct FlakyBlobs {
        inner: LocalBlobStore,
        fail_upload: bool,
        fail_remove: bool,
        removals: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FlakyBlobs {
        async fn upload(
            &self,
            bucket: &str,
            key: &str,
            bytes: Bytes,
            options: UploadOptions,
        ) -> Result<(), AppError> {
            if self.fail_upload {
                return Err(AppError::Upload("storage unavailable".into()));
            }
            self.inner.upload(bucket, key, bytes, options).await
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            self.inner.public_url(bucket, key)
        }

        async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            if self.fail_remove {
                return Err(AppError::Internal("remove refused".into()));
            }
            self.inner.remove(bucket, keys).await
        }
    }

    /// Resource store double whose writes can be made to fail.
    struct FlakyRows {
        inner: Repository,
        fail_insert: bool,
        fail_update: bool,
        vanish_on_write: bool,
        fail_delete: bool,
        zero_rows_on_delete: bool,
    }

    #[async_trait]
    impl ResourceStore for FlakyRows {
        async fn list_members(&self) -> Result<Vec<TeamMember>, AppError> {
            self.inner.list_members().await
        }

        async fn get_member(&self, id: i64) -> Result<Option<TeamMember>, AppError> {
            self.inner.get_member(id).await
        }

        async fn insert_member(&self, record: &MemberRecord) -> Result<TeamMember, AppError> {
            if self.fail_insert {
                return Err(AppError::Persistence("insert rejected".into()));
            }
            self.inner.insert_member(record).await
        }

        async fn update_member(
            &self,
            id: i64,
            patch: &MemberPatch,
        ) -> Result<Option<TeamMember>, AppError> {
            if self.fail_update {
                return Err(AppError::Persistence("update rejected".into()));
            }
            // Row removed by a concurrent request after the service read it.
            if self.vanish_on_write {
                return Ok(None);
            }
            self.inner.update_member(id, patch).await
        }

        async fn delete_member(&self, id: i64) -> Result<u64, AppError> {
            if self.fail_delete {
                return Err(AppError::Persistence("delete rejected".into()));
            }
            if self.zero_rows_on_delete {
                return Ok(0);
            }
            self.inner.delete_member(id).await
        }
    }

    #[derive(Default)]
    struct Faults {
        fail_upload: bool,
        fail_remove: bool,
        fail_insert: bool,
        fail_update: bool,
        vanish_on_write: bool,
        fail_delete: bool,
        zero_rows_on_delete: bool,
    }

    struct Harness {
        service: TeamService,
        rows: Arc<FlakyRows>,
        blobs: Arc<FlakyBlobs>,
        _dir: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            Self::with_faults(Faults::default()).await
        }

        async fn with_faults(faults: Faults) -> Self {
            let dir = TempDir::new().unwrap();
            let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
            let local = LocalBlobStore::open(&dir.path().join("storage"), "http://portal.test")
                .await
                .unwrap();

            let rows = Arc::new(FlakyRows {
                inner: Repository::new(pool),
                fail_insert: faults.fail_insert,
                fail_update: faults.fail_update,
                vanish_on_write: faults.vanish_on_write,
                fail_delete: faults.fail_delete,
                zero_rows_on_delete: faults.zero_rows_on_delete,
            });
            let blobs = Arc::new(FlakyBlobs {
                inner: local,
                fail_upload: faults.fail_upload,
                fail_remove: faults.fail_remove,
                removals: AtomicUsize::new(0),
            });

            Self {
                service: TeamService::new(rows.clone(), blobs.clone(), BUCKET),
                rows,
                blobs,
                _dir: dir,
            }
        }

        fn stored_objects(&self) -> Vec<String> {
            let dir = self.blobs.inner.root().join(BUCKET);
            let Ok(entries) = std::fs::read_dir(dir) else {
                return Vec::new();
            };
            let mut names: Vec<String> = entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }

        fn object_exists(&self, url: &str) -> bool {
            let key = key_from_public_url(url).unwrap();
            self.blobs.inner.root().join(BUCKET).join(key).exists()
        }
    }

    fn photo(name: &str, bytes: &'static [u8]) -> PhotoUpload {
        PhotoUpload {
            file_name: name.to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: Bytes::from_static(bytes),
        }
    }

    fn sharma() -> NewMember {
        NewMember {
            name: "A. Sharma".to_string(),
            role: "Member".to_string(),
            category: Some("Ward 3".to_string()),
            term: Some("2021-2026".to_string()),
            description: None,
            photo: photo("sharma.jpg", b"jpeg-bytes"),
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let h = Harness::new().await;

        let created = h.service.create(sharma()).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.name, "A. Sharma");
        assert_eq!(created.role, "Member");
        assert_eq!(created.term.as_deref(), Some("2021-2026"));

        let url = created.photo_url.clone().unwrap();
        assert!(url.starts_with("http://portal.test/storage/v1/object/public/team-photos/"));
        let key = key_from_public_url(&url).unwrap();
        let (ts, name) = key.split_once('-').unwrap();
        assert!(ts.parse::<i64>().is_ok());
        assert_eq!(name, "sharma.jpg");
        assert!(h.object_exists(&url));

        let listed = h.service.list().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn test_create_upload_failure_writes_no_row() {
        let h = Harness::with_faults(Faults {
            fail_upload: true,
            ..Default::default()
        })
        .await;

        let err = h.service.create(sharma()).await.unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
        assert!(h.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_insert_failure_leaves_orphaned_blob() {
        let h = Harness::with_faults(Faults {
            fail_insert: true,
            ..Default::default()
        })
        .await;

        let err = h.service.create(sharma()).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(h.rows.list_members().await.unwrap().is_empty());
        assert_eq!(h.stored_objects().len(), 1);
    }

    #[tokio::test]
    async fn test_update_changes_only_supplied_field() {
        let h = Harness::new().await;
        let before = h.service.create(sharma()).await.unwrap();

        let update = MemberUpdate {
            patch: MemberPatch {
                role: Some("Secretary".to_string()),
                ..Default::default()
            },
            photo: None,
        };
        let after = h.service.update(before.id, update).await.unwrap();

        assert_eq!(after.role, "Secretary");
        assert_eq!(after.photo_url, before.photo_url);
        assert_eq!(
            TeamMember {
                role: before.role.clone(),
                ..after
            },
            before
        );
    }

    #[tokio::test]
    async fn test_update_with_photo_keeps_previous_blob() {
        let h = Harness::new().await;
        let before = h.service.create(sharma()).await.unwrap();

        let update = MemberUpdate {
            patch: MemberPatch::default(),
            photo: Some(photo("sharma.jpg", b"new-jpeg")),
        };
        let after = h.service.update(before.id, update).await.unwrap();

        let old_url = before.photo_url.unwrap();
        let new_url = after.photo_url.unwrap();
        assert_ne!(old_url, new_url);
        assert!(h.object_exists(&old_url));
        assert!(h.object_exists(&new_url));
        assert_eq!(after.name, before.name);
    }

    #[tokio::test]
    async fn test_update_missing_member_uploads_nothing() {
        let h = Harness::new().await;
        let update = MemberUpdate {
            patch: MemberPatch {
                name: Some("Nobody".to_string()),
                ..Default::default()
            },
            photo: Some(photo("nobody.jpg", b"x")),
        };

        let err = h.service.update(999, update).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(h.stored_objects().is_empty());
    }

    #[tokio::test]
    async fn test_update_upload_failure_leaves_row_untouched() {
        let h = Harness::new().await;
        let before = h.service.create(sharma()).await.unwrap();

        let failing = Harness::with_faults(Faults {
            fail_upload: true,
            ..Default::default()
        })
        .await;
        let service = TeamService::new(h.rows.clone(), failing.blobs.clone(), BUCKET);

        let update = MemberUpdate {
            patch: MemberPatch {
                role: Some("Treasurer".to_string()),
                ..Default::default()
            },
            photo: Some(photo("new.jpg", b"x")),
        };
        let err = service.update(before.id, update).await.unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
        assert_eq!(h.service.get(before.id).await.unwrap(), before);
    }

    fn role_update(role: &str) -> MemberUpdate {
        MemberUpdate {
            patch: MemberPatch {
                role: Some(role.to_string()),
                ..Default::default()
            },
            photo: None,
        }
    }

    #[tokio::test]
    async fn test_update_persistence_failure() {
        let h = Harness::with_faults(Faults {
            fail_update: true,
            ..Default::default()
        })
        .await;
        let before = h.service.create(sharma()).await.unwrap();

        let err = h
            .service
            .update(before.id, role_update("Secretary"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(h.service.get(before.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_row_vanished_is_not_found() {
        let h = Harness::with_faults(Faults {
            vanish_on_write: true,
            ..Default::default()
        })
        .await;
        let before = h.service.create(sharma()).await.unwrap();

        let err = h
            .service
            .update(before.id, role_update("Secretary"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_update_returns_current_record() {
        let h = Harness::new().await;
        let before = h.service.create(sharma()).await.unwrap();

        let after = h
            .service
            .update(before.id, MemberUpdate::default())
            .await
            .unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_blob() {
        let h = Harness::new().await;
        let created = h.service.create(sharma()).await.unwrap();

        h.service.delete(created.id).await.unwrap();

        assert!(h.service.list().await.unwrap().is_empty());
        assert!(h.stored_objects().is_empty());
        assert_eq!(h.blobs.removals.load(Ordering::SeqCst), 1);

        let err = h.service.delete(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_blob_removal_fails() {
        let h = Harness::with_faults(Faults {
            fail_remove: true,
            ..Default::default()
        })
        .await;
        let created = h.service.create(sharma()).await.unwrap();

        h.service.delete(created.id).await.unwrap();

        assert!(h.service.list().await.unwrap().is_empty());
        assert_eq!(h.blobs.removals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_row_failure_keeps_blob() {
        let h = Harness::with_faults(Faults {
            fail_delete: true,
            ..Default::default()
        })
        .await;
        let created = h.service.create(sharma()).await.unwrap();

        let err = h.service.delete(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(h.blobs.removals.load(Ordering::SeqCst), 0);
        assert!(h.object_exists(created.photo_url.as_deref().unwrap()));
        assert_eq!(h.service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_zero_rows_is_not_found_and_keeps_blob() {
        let h = Harness::with_faults(Faults {
            zero_rows_on_delete: true,
            ..Default::default()
        })
        .await;
        let created = h.service.create(sharma()).await.unwrap();

        let err = h.service.delete(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.blobs.removals.load(Ordering::SeqCst), 0);
        assert!(h.object_exists(created.photo_url.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_mutates_nothing() {
        let h = Harness::new().await;
        let created = h.service.create(sharma()).await.unwrap();

        let err = h.service.delete(999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(h.blobs.removals.load(Ordering::SeqCst), 0);
        assert_eq!(h.service.list().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_list_orders_by_creation() {
        let h = Harness::new().await;
        for name in ["first", "second", "third"] {
            let mut member = sharma();
            member.name = name.to_string();
            member.photo = photo(&format!("{}.jpg", name), b"x");
            h.service.create(member).await.unwrap();
        }

        let names: Vec<_> = h
            .service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
