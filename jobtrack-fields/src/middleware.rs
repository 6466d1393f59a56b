//! Encryption/decryption middleware between the app and the document store.
//!
//! Sensitive fields (per the registry) are replaced by Encrypted Field Values
//! on the way in and restored on the way out. Public fields are never touched.
//! Nested containers are walked element by element with the nested entity
//! type's field list.
//!
//! Decryption runs in one of two modes:
//! - [`DecryptMode::Strict`]: the first field that fails aborts the call with
//!   [`FieldError::FieldDecryptionFailure`].
//! - [`DecryptMode::Lenient`]: a failing field keeps its stored value, the
//!   failure is logged and collected in a [`DecryptReport`], and the rest of
//!   the record (and batch) is still decrypted. Values that do not look
//!   encrypted are treated as legacy plaintext and left alone.

use crate::config::FieldCryptoConfig;
use crate::error::{FieldError, FieldResult};
use crate::record::{FieldValue, Record, parse_timestamp};
use crate::registry::{EntityType, timestamp_fields};
use futures::future::{BoxFuture, FutureExt, join_all};
use jobtrack_crypto::{FieldKey, decrypt_string, encrypt_string, looks_encrypted};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Marker field set on records produced by `encrypt_for_storage`.
pub const ENCRYPTED_MARKER: &str = "_encrypted";

/// Default minimum length for the base64 shape check.
pub const DEFAULT_ENCRYPTED_LENGTH_THRESHOLD: usize = 50;

/// Shown to the user when a batch read kept undecryptable fields.
pub const DECRYPT_WARNING: &str =
    "Some data could not be decrypted. Log out and back in to restore access.";

/// Failure policy for decryption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecryptMode {
    #[default]
    Strict,
    Lenient,
}

/// A field that kept its stored value during lenient decryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFailure {
    pub entity_type: EntityType,
    /// Dotted path, e.g. `events[1].title`.
    pub field: String,
    pub reason: String,
}

/// Fields that could not be decrypted, by record index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecryptReport {
    failures: Vec<(usize, FieldFailure)>,
}

impl DecryptReport {
    fn extend(&mut self, index: usize, failures: Vec<FieldFailure>) {
        self.failures
            .extend(failures.into_iter().map(|failure| (index, failure)));
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[(usize, FieldFailure)] {
        &self.failures
    }

    /// Indices of records with at least one failed field, ascending.
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.failures.iter().map(|(i, _)| *i).collect();
        indices.dedup();
        indices
    }

    pub fn warning_message(&self) -> Option<&'static str> {
        self.has_failures().then_some(DECRYPT_WARNING)
    }
}

/// Result of a batch read: records in input order plus what failed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchDecryptOutcome {
    pub records: Vec<Record>,
    pub report: DecryptReport,
}

impl BatchDecryptOutcome {
    pub fn has_failures(&self) -> bool {
        self.report.has_failures()
    }

    pub fn warning_message(&self) -> Option<&'static str> {
        self.report.warning_message()
    }
}

/// Whether `record` (or any nested record) holds a non-null sensitive value.
pub fn has_sensitive_values(record: &Record, entity_type: EntityType) -> bool {
    let own = entity_type
        .sensitive_fields()
        .iter()
        .any(|field| record.get(field).is_some_and(|v| !v.is_null()));

    own || entity_type
        .nested_fields()
        .iter()
        .any(|(container, nested_type)| match record.get(container) {
            Some(FieldValue::List(items)) => items.iter().any(|item| {
                item.as_record()
                    .is_some_and(|inner| has_sensitive_values(inner, *nested_type))
            }),
            Some(FieldValue::Map(inner)) => has_sensitive_values(inner, *nested_type),
            _ => false,
        })
}

/// Encrypted-state check: the marker is set, or some sensitive field holds
/// base64 text longer than `threshold`.
pub fn is_encrypted_record(record: &Record, entity_type: EntityType, threshold: usize) -> bool {
    if is_marked(record) {
        return true;
    }
    entity_type
        .sensitive_fields()
        .iter()
        .any(|field| record.text(field).is_some_and(|s| looks_encrypted(s, threshold)))
}

fn is_marked(record: &Record) -> bool {
    matches!(record.get(ENCRYPTED_MARKER), Some(FieldValue::Bool(true)))
}

fn restore(field: &str, plaintext: String) -> FieldValue {
    if timestamp_fields().contains(&field)
        && let Some(ts) = parse_timestamp(&plaintext)
    {
        return FieldValue::Timestamp(ts);
    }
    FieldValue::Text(plaintext)
}

/// Field-level encryption over a borrowed key handle.
#[derive(Clone, Copy)]
pub struct FieldCrypto<'k> {
    key: &'k FieldKey,
    threshold: usize,
    single_record_mode: DecryptMode,
    batch_mode: DecryptMode,
}

impl<'k> FieldCrypto<'k> {
    pub fn new(key: &'k FieldKey) -> Self {
        Self::with_config(key, &FieldCryptoConfig::default())
    }

    pub fn with_config(key: &'k FieldKey, config: &FieldCryptoConfig) -> Self {
        Self {
            key,
            threshold: config.encrypted_length_threshold,
            single_record_mode: config.single_record_mode,
            batch_mode: config.batch_mode,
        }
    }

    pub fn is_encrypted(&self, record: &Record, entity_type: EntityType) -> bool {
        is_encrypted_record(record, entity_type, self.threshold)
    }

    /// Encrypts the sensitive fields of `record`, including nested records.
    ///
    /// Absent and null fields stay as they are. Values that already decrypt
    /// under this key are kept, so saving a stored record again does not
    /// wrap it twice. An incoming marker is not trusted.
    pub async fn encrypt_for_storage(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<Record> {
        let mut encrypted = self.encrypt_fields(record, entity_type).await?;
        encrypted.insert(ENCRYPTED_MARKER, true);
        Ok(encrypted)
    }

    /// Decrypts with the configured single-record mode (strict by default).
    ///
    /// In lenient mode, failed fields keep their stored value and are only
    /// logged; use [`FieldCrypto::decrypt_with_mode`] to see them.
    pub async fn decrypt_from_storage(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<Record> {
        let (decrypted, _) = self
            .decrypt_with_mode(record, entity_type, self.single_record_mode)
            .await?;
        Ok(decrypted)
    }

    pub async fn decrypt_strict(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<Record> {
        let (decrypted, _) = self
            .decrypt_with_mode(record, entity_type, DecryptMode::Strict)
            .await?;
        Ok(decrypted)
    }

    pub async fn decrypt_lenient(
        &self,
        record: &Record,
        entity_type: EntityType,
    ) -> FieldResult<(Record, DecryptReport)> {
        self.decrypt_with_mode(record, entity_type, DecryptMode::Lenient)
            .await
    }

    pub async fn decrypt_with_mode(
        &self,
        record: &Record,
        entity_type: EntityType,
        mode: DecryptMode,
    ) -> FieldResult<(Record, DecryptReport)> {
        let (decrypted, failures) = self
            .decrypt_fields(record, entity_type, entity_type, mode, String::new())
            .await?;
        let mut report = DecryptReport::default();
        report.extend(0, failures);
        Ok((decrypted, report))
    }

    /// Encrypts every record concurrently. Output order matches input order.
    pub async fn encrypt_batch(
        &self,
        records: &[Record],
        entity_type: EntityType,
    ) -> FieldResult<Vec<Record>> {
        debug!("encrypting batch of {} {entity_type} records", records.len());
        join_all(
            records
                .iter()
                .map(|record| self.encrypt_for_storage(record, entity_type)),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Decrypts every record concurrently with the configured batch mode
    /// (lenient by default).
    pub async fn decrypt_batch(
        &self,
        records: &[Record],
        entity_type: EntityType,
    ) -> FieldResult<BatchDecryptOutcome> {
        self.decrypt_batch_with_mode(records, entity_type, self.batch_mode)
            .await
    }

    /// Decrypts every record concurrently. All items run to completion; in
    /// strict mode the first failing record's error (by index) is returned.
    pub async fn decrypt_batch_with_mode(
        &self,
        records: &[Record],
        entity_type: EntityType,
        mode: DecryptMode,
    ) -> FieldResult<BatchDecryptOutcome> {
        debug!("decrypting batch of {} {entity_type} records", records.len());
        let results = join_all(records.iter().map(|record| {
            self.decrypt_fields(record, entity_type, entity_type, mode, String::new())
        }))
        .await;

        let mut outcome = BatchDecryptOutcome {
            records: Vec::with_capacity(results.len()),
            report: DecryptReport::default(),
        };
        for (index, result) in results.into_iter().enumerate() {
            let (record, failures) = result?;
            outcome.records.push(record);
            outcome.report.extend(index, failures);
        }

        if outcome.has_failures() {
            warn!(
                "{} of {} {entity_type} records kept undecryptable fields",
                outcome.report.failed_indices().len(),
                records.len()
            );
        }
        Ok(outcome)
    }

    fn is_sealed(&self, value: &FieldValue) -> bool {
        matches!(
            value,
            FieldValue::Text(s) if looks_encrypted(s, self.threshold)
                && decrypt_string(s, self.key).is_ok()
        )
    }

    fn encrypt_fields<'a>(
        &'a self,
        record: &'a Record,
        entity_type: EntityType,
    ) -> BoxFuture<'a, FieldResult<Record>> {
        async move {
            let mut out = record.clone();
            for &field in entity_type.sensitive_fields() {
                if let Some(value) = record.get(field).filter(|v| !v.is_null()) {
                    if self.is_sealed(value) {
                        continue;
                    }
                    let plaintext = Zeroizing::new(value.to_plaintext()?);
                    out.insert(field, encrypt_string(&plaintext, self.key)?);
                }
            }

            for &(container, nested_type) in entity_type.nested_fields() {
                match record.get(container) {
                    Some(FieldValue::List(items)) => {
                        let results = join_all(items.iter().map(|item| async move {
                            match item {
                                FieldValue::Map(inner) => self
                                    .encrypt_fields(inner, nested_type)
                                    .await
                                    .map(FieldValue::Map),
                                other => Ok(other.clone()),
                            }
                        }))
                        .await;
                        let items = results.into_iter().collect::<FieldResult<Vec<_>>>()?;
                        out.insert(container, items);
                    }
                    Some(FieldValue::Map(inner)) => {
                        let encrypted = self.encrypt_fields(inner, nested_type).await?;
                        out.insert(container, encrypted);
                    }
                    _ => {}
                }
            }
            Ok(out)
        }
        .boxed()
    }

    fn decrypt_fields<'a>(
        &'a self,
        record: &'a Record,
        entity_type: EntityType,
        root: EntityType,
        mode: DecryptMode,
        prefix: String,
    ) -> BoxFuture<'a, FieldResult<(Record, Vec<FieldFailure>)>> {
        async move {
            let mut out = record.clone();
            out.remove(ENCRYPTED_MARKER);
            let mut failures = Vec::new();

            for &field in entity_type.sensitive_fields() {
                let Some(FieldValue::Text(stored)) = record.get(field) else {
                    continue;
                };
                if mode == DecryptMode::Lenient && !looks_encrypted(stored, self.threshold) {
                    continue;
                }

                match decrypt_string(stored, self.key) {
                    Ok(plaintext) => {
                        out.insert(field, restore(field, plaintext));
                    }
                    Err(source) => {
                        let path = format!("{prefix}{field}");
                        if mode == DecryptMode::Strict {
                            return Err(FieldError::FieldDecryptionFailure {
                                entity_type: root,
                                field: path,
                                source,
                            });
                        }
                        warn!("kept stored value for {root} field {path}: {source}");
                        failures.push(FieldFailure {
                            entity_type: root,
                            field: path,
                            reason: source.to_string(),
                        });
                    }
                }
            }

            for &(container, nested_type) in entity_type.nested_fields() {
                match record.get(container) {
                    Some(FieldValue::List(items)) => {
                        let results = join_all(items.iter().enumerate().map(|(i, item)| {
                            let nested_prefix = format!("{prefix}{container}[{i}].");
                            async move {
                                match item {
                                    FieldValue::Map(inner) => self
                                        .decrypt_fields(
                                            inner,
                                            nested_type,
                                            root,
                                            mode,
                                            nested_prefix,
                                        )
                                        .await
                                        .map(|(r, f)| (FieldValue::Map(r), f)),
                                    other => Ok((other.clone(), Vec::new())),
                                }
                            }
                        }))
                        .await;

                        let mut decrypted = Vec::with_capacity(results.len());
                        for result in results {
                            let (value, nested_failures) = result?;
                            decrypted.push(value);
                            failures.extend(nested_failures);
                        }
                        out.insert(container, decrypted);
                    }
                    Some(FieldValue::Map(inner)) => {
                        let (decrypted, nested_failures) = self
                            .decrypt_fields(
                                inner,
                                nested_type,
                                root,
                                mode,
                                format!("{prefix}{container}."),
                            )
                            .await?;
                        out.insert(container, decrypted);
                        failures.extend(nested_failures);
                    }
                    _ => {}
                }
            }
            Ok((out, failures))
        }
        .boxed()
    }
}
