use crate::layout::StoreLayout;
use crate::objects::ObjectStore;
use crate::payloads::PayloadStore;
use crate::StoreError;

use strata_schema::{Digest, Object};

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub objects_checked: usize,
    pub objects_passed: usize,
    pub payloads_checked: usize,
    pub failed: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub digest: Digest,
    pub reason: String,
}

/// Walk every stored object and verify its stored bytes still match its
/// digest, every child reference resolves, and every blob's payload file
/// is present.
///
/// All failures are collected into the report rather than stopping at the
/// first one, so a single pass gives the complete damage picture.
pub fn check_database_integrity(layout: &StoreLayout) -> Result<IntegrityReport, StoreError> {
    let object_store = ObjectStore::new(layout.clone());
    let payload_store = PayloadStore::new(layout.clone());

    let all_objects = object_store.iter_digests()?;
    let mut report = IntegrityReport {
        objects_checked: all_objects.len(),
        ..Default::default()
    };

    for digest in &all_objects {
        let object = match object_store.read_object(digest) {
            Ok(object) => object,
            Err(StoreError::DigestMismatch { actual, .. }) => {
                report.failed.push(IntegrityFailure {
                    digest: *digest,
                    reason: format!("object digest mismatch: got {actual}"),
                });
                continue;
            }
            Err(e) => {
                report.failed.push(IntegrityFailure {
                    digest: *digest,
                    reason: format!("object read error: {e}"),
                });
                continue;
            }
        };

        let mut ok = true;
        for child in object.child_objects() {
            if !object_store.has_object(&child) {
                report.failed.push(IntegrityFailure {
                    digest: *digest,
                    reason: format!("missing child object {child}"),
                });
                ok = false;
            }
        }
        if let Object::Blob(blob) = &object {
            report.payloads_checked += 1;
            if !payload_store.has_payload(&blob.payload) {
                report.failed.push(IntegrityFailure {
                    digest: *digest,
                    reason: format!("missing payload {}", blob.payload),
                });
                ok = false;
            }
        }
        if ok {
            report.objects_passed += 1;
        }
    }

    Ok(report)
}
