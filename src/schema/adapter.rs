//! Adapter from submitted bundles to assessment requests
//!
//! Each record is decoded and validated on its own. Bad records are dropped,
//! counted in `DataQuality` and logged; only a malformed bundle envelope is
//! an error.

use crate::error::EngineError;
use crate::schema::record::*;
use crate::types::{AssessmentRequest, BlockEvent, DataQuality, DiaryEntry, RecordSource};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Adapter for turning submitted JSON into engine input
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse an assessment bundle document
    pub fn parse_bundle(json: &str) -> Result<AssessmentBundle, EngineError> {
        let bundle: AssessmentBundle = serde_json::from_str(json)?;
        Ok(bundle)
    }

    /// Parse NDJSON (newline-delimited JSON) diary records.
    ///
    /// Lines are only checked to be JSON; record-level validation happens
    /// when the bundle is converted.
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Value>, EngineError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(EngineError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Fixed offset of the bundle, rejecting offsets no real zone uses
    pub fn offset_of(bundle: &AssessmentBundle) -> Result<FixedOffset, EngineError> {
        let minutes = bundle.utc_offset_minutes;
        if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(EngineError::ParseError(format!(
                "utcOffsetMinutes {minutes} is outside ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }
        FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            EngineError::ParseError(format!("utcOffsetMinutes {minutes} is not a valid offset"))
        })
    }

    /// Decode every record of the bundle into an assessment request
    pub fn to_request(bundle: AssessmentBundle) -> Result<AssessmentRequest, EngineError> {
        let offset = Self::offset_of(&bundle)?;
        let mut quality = DataQuality {
            total_records: bundle.entries.len() + bundle.block_events.len(),
            ..Default::default()
        };

        let mut entries = Vec::with_capacity(bundle.entries.len());
        for (index, value) in bundle.entries.iter().enumerate() {
            match decode_entry(value, bundle.user_id, offset) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(index, reason = %e, "dropping diary record");
                    quality.drop_record(RecordSource::Entries, index, e.to_string());
                }
            }
        }

        let mut block_events = Vec::with_capacity(bundle.block_events.len());
        for (index, value) in bundle.block_events.iter().enumerate() {
            match decode_block_event(value, bundle.user_id, offset) {
                Ok(event) => block_events.push(event),
                Err(e) => {
                    warn!(index, reason = %e, "dropping block event");
                    quality.drop_record(RecordSource::BlockEvents, index, e.to_string());
                }
            }
        }

        quality.used_records = entries.len() + block_events.len();
        debug!(
            entries = entries.len(),
            block_events = block_events.len(),
            dropped = quality.dropped_records,
            "decoded assessment bundle"
        );

        Ok(AssessmentRequest {
            user_id: bundle.user_id,
            now: bundle.now,
            account_created_at: bundle.account_created_at,
            utc_offset: offset,
            entries,
            block_events,
            upstream_quality: quality,
        })
    }

    /// Validate a bundle's records without building a request
    pub fn validate_records(bundle: &AssessmentBundle) -> Result<Vec<ValidationResult>, EngineError> {
        let offset = Self::offset_of(bundle)?;
        let entries = bundle.entries.iter().enumerate().filter_map(|(index, value)| {
            decode_entry(value, bundle.user_id, offset)
                .err()
                .map(|error| ValidationResult {
                    source: RecordSource::Entries,
                    index,
                    record_id: value.get("id").and_then(Value::as_str).map(str::to_string),
                    error,
                })
        });
        let blocks = bundle
            .block_events
            .iter()
            .enumerate()
            .filter_map(|(index, value)| {
                decode_block_event(value, bundle.user_id, offset)
                    .err()
                    .map(|error| ValidationResult {
                        source: RecordSource::BlockEvents,
                        index,
                        record_id: None,
                        error,
                    })
            });
        Ok(entries.chain(blocks).collect())
    }
}

/// A record that failed validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub source: RecordSource,
    pub index: usize,
    pub record_id: Option<String>,
    pub error: ValidationError,
}

fn decode_entry(
    value: &Value,
    user_id: Uuid,
    offset: FixedOffset,
) -> Result<DiaryEntry, ValidationError> {
    let raw: RawDiaryRecord = serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::Undecodable(e.to_string()))?;
    let date = match raw.date.as_deref() {
        Some(text) => parse_date(text, offset)?,
        None => return Err(ValidationError::MissingDate),
    };
    raw.into_entry(user_id, date)
}

fn decode_block_event(
    value: &Value,
    user_id: Uuid,
    offset: FixedOffset,
) -> Result<BlockEvent, ValidationError> {
    let raw: RawBlockEvent = serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::Undecodable(e.to_string()))?;
    let owner = raw.user_id.unwrap_or(user_id);
    if owner != user_id {
        return Err(ValidationError::ForeignUser(owner));
    }
    let timestamp = match raw.timestamp.as_deref() {
        Some(text) => parse_date(text, offset)?,
        None => return Err(ValidationError::MissingDate),
    };
    Ok(BlockEvent {
        user_id,
        domain: raw.domain,
        timestamp,
    })
}

/// Parse an RFC 3339 instant, a naive local date-time or a bare local date
pub fn parse_date(text: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::MissingDate);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| ValidationError::UnparsableDate(text.to_string()))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::UnparsableDate(text.to_string()))
}
