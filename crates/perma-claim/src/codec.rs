//! Canonical schema blob codec
//!
//! Encoding is compact JSON with a fixed field order, so the same logical
//! blob always produces the same bytes and therefore the same [`BlobRef`].
//! The signing message is the canonical encoding with `signature` omitted.
//!
//! The format is versioned by `schemaVersion` and must stay byte-stable:
//! every stored reference is derived from it.

use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::Signature;
use perma_blob::BlobRef;
use serde::{Deserialize, Serialize};

use crate::error::ClaimError;
use crate::schema::{Claim, ClaimDraft, Permanode, SchemaBlob, SignerId};

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// `blobType` of claims
pub const CLAIM_TYPE: &str = "claim";

/// `blobType` of permanodes
pub const PERMANODE_TYPE: &str = "permanode";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ClaimWire {
    schema_version: u32,
    blob_type: String,
    target: String,
    claim_type: String,
    attribute: String,
    value: String,
    timestamp: String,
    signer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PermanodeWire {
    schema_version: u32,
    blob_type: String,
    random: String,
    created: String,
    signer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    blob_type: Option<String>,
}

/// Content reference of encoded bytes
#[inline]
#[must_use]
pub fn digest(bytes: &[u8]) -> BlobRef {
    BlobRef::compute(bytes)
}

/// Canonical textual form of a timestamp (RFC 3339, nanoseconds, `Z`)
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ClaimError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ClaimError::malformed(format!("timestamp '{s}': {e}")))
}

fn parse_signature(s: &str) -> Result<Signature, ClaimError> {
    let bytes = hex::decode(s).map_err(|e| ClaimError::malformed(format!("signature: {e}")))?;
    let arr: [u8; 64] = bytes
        .try_into()
        .map_err(|_| ClaimError::malformed("signature must be 64 bytes"))?;
    Ok(Signature::from_bytes(&arr))
}

fn claim_wire(draft: &ClaimDraft, signer: &SignerId, signature: Option<&Signature>) -> ClaimWire {
    ClaimWire {
        schema_version: SCHEMA_VERSION,
        blob_type: CLAIM_TYPE.to_string(),
        target: draft.target.to_string(),
        claim_type: draft.claim_type.as_str().to_string(),
        attribute: draft.attribute.clone(),
        value: draft.value.clone(),
        timestamp: format_timestamp(draft.timestamp),
        signer: signer.to_string(),
        signature: signature.map(|s| hex::encode(s.to_bytes())),
    }
}

fn to_bytes<T: Serialize>(wire: &T) -> Result<Vec<u8>, ClaimError> {
    serde_json::to_vec(wire).map_err(ClaimError::Encode)
}

fn check_header(version: u32, blob_type: &str, expected: &str) -> Result<(), ClaimError> {
    if version != SCHEMA_VERSION {
        return Err(ClaimError::UnsupportedVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if blob_type != expected {
        return Err(ClaimError::UnexpectedType {
            expected: expected.to_string(),
            actual: blob_type.to_string(),
        });
    }
    Ok(())
}

fn ensure_canonical(original: &[u8], reencoded: &[u8]) -> Result<(), ClaimError> {
    if original == reencoded {
        Ok(())
    } else {
        Err(ClaimError::malformed("non-canonical encoding"))
    }
}

/// Bytes a claim author signs
///
/// # Errors
/// Returns error if serialization fails
pub fn claim_signing_bytes(draft: &ClaimDraft, signer: &SignerId) -> Result<Vec<u8>, ClaimError> {
    to_bytes(&claim_wire(draft, signer, None))
}

/// Encode a signed claim canonically
///
/// # Errors
/// Returns error if serialization fails
pub fn encode_claim(claim: &Claim) -> Result<Vec<u8>, ClaimError> {
    to_bytes(&claim_wire(claim.draft(), claim.signer(), Some(claim.signature())))
}

/// Decode a claim
///
/// Structural only: the signature is parsed but not verified, see
/// [`Claim::verify`]. Non-canonical encodings are rejected so that a claim's
/// reference is always a function of its logical content.
///
/// # Errors
/// Returns [`ClaimError::Malformed`] for structural failures
pub fn decode_claim(bytes: &[u8]) -> Result<Claim, ClaimError> {
    let wire: ClaimWire =
        serde_json::from_slice(bytes).map_err(|e| ClaimError::malformed(e.to_string()))?;
    check_header(wire.schema_version, &wire.blob_type, CLAIM_TYPE)?;

    let signature = wire
        .signature
        .as_deref()
        .ok_or_else(|| ClaimError::malformed("missing field `signature`"))
        .and_then(parse_signature)?;
    let draft = ClaimDraft {
        target: wire.target.parse()?,
        claim_type: wire.claim_type.parse()?,
        attribute: wire.attribute,
        value: wire.value,
        timestamp: parse_timestamp(&wire.timestamp)?,
    };
    draft.validate()?;
    let signer: SignerId = wire.signer.parse()?;

    let claim = Claim::from_parts(draft, signer, signature);
    ensure_canonical(bytes, &encode_claim(&claim)?)?;
    Ok(claim)
}

/// Bytes a permanode owner signs
///
/// # Errors
/// Returns error if serialization fails
pub fn permanode_signing_bytes(
    random: &str,
    created: DateTime<Utc>,
    signer: &SignerId,
) -> Result<Vec<u8>, ClaimError> {
    to_bytes(&PermanodeWire {
        schema_version: SCHEMA_VERSION,
        blob_type: PERMANODE_TYPE.to_string(),
        random: random.to_string(),
        created: format_timestamp(created),
        signer: signer.to_string(),
        signature: None,
    })
}

/// Encode a signed permanode canonically
///
/// # Errors
/// Returns error if serialization fails
pub fn encode_permanode(permanode: &Permanode) -> Result<Vec<u8>, ClaimError> {
    to_bytes(&PermanodeWire {
        schema_version: SCHEMA_VERSION,
        blob_type: PERMANODE_TYPE.to_string(),
        random: permanode.random().to_string(),
        created: format_timestamp(permanode.created()),
        signer: permanode.owner().to_string(),
        signature: Some(hex::encode(permanode.signature().to_bytes())),
    })
}

/// Decode a permanode
///
/// # Errors
/// Returns [`ClaimError::Malformed`] for structural failures
pub fn decode_permanode(bytes: &[u8]) -> Result<Permanode, ClaimError> {
    let wire: PermanodeWire =
        serde_json::from_slice(bytes).map_err(|e| ClaimError::malformed(e.to_string()))?;
    check_header(wire.schema_version, &wire.blob_type, PERMANODE_TYPE)?;
    if wire.random.is_empty() {
        return Err(ClaimError::malformed("permanode random must not be empty"));
    }

    let signature = wire
        .signature
        .as_deref()
        .ok_or_else(|| ClaimError::malformed("missing field `signature`"))
        .and_then(parse_signature)?;
    let permanode = Permanode::from_parts(
        wire.random,
        parse_timestamp(&wire.created)?,
        wire.signer.parse()?,
        signature,
    );
    ensure_canonical(bytes, &encode_permanode(&permanode)?)?;
    Ok(permanode)
}

/// Decode any schema blob by sniffing its `blobType`
///
/// # Errors
/// Returns [`ClaimError::NotSchemaBlob`] if the bytes are not a JSON object
/// with a `blobType`, otherwise the per-type decode error
pub fn decode_schema_blob(bytes: &[u8]) -> Result<SchemaBlob, ClaimError> {
    let header: Header = serde_json::from_slice(bytes).map_err(|_| ClaimError::NotSchemaBlob)?;
    match header.blob_type.as_deref() {
        Some(CLAIM_TYPE) => decode_claim(bytes).map(SchemaBlob::Claim),
        Some(PERMANODE_TYPE) => decode_permanode(bytes).map(SchemaBlob::Permanode),
        Some(other) => Err(ClaimError::UnexpectedType {
            expected: format!("{CLAIM_TYPE} or {PERMANODE_TYPE}"),
            actual: other.to_string(),
        }),
        None => Err(ClaimError::NotSchemaBlob),
    }
}
