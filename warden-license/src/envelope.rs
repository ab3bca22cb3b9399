//! Enveloped signatures for license documents.
//!
//! A sealed document is the pretty-printed JSON document followed by a
//! trailing `signature` member. The signature covers the canonical form of
//! the document without any `signature` member: compact JSON with object
//! keys sorted at every level. The block references the whole document by
//! an empty reference.
//!
//! Opening a document scans its top-level members as written, so a second
//! `signature` member cannot hide behind JSON's "last key wins" rule.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use warden_crypto::{sha256_hex, Signature, SigningKey, VerifyingKey};

use crate::document::LicenseDocument;
use crate::error::{LicenseError, LicenseResult};

/// Name of the top-level member holding the signature block.
pub const SIGNATURE_FIELD: &str = "signature";

const DIGEST_METHOD: &str = "sha256";
const ALGORITHM: &str = "ed25519";

/// The embedded signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Empty: the signature covers the enclosing document.
    pub reference: String,
    pub digest_method: String,
    /// Hex digest of the canonical document.
    pub digest: String,
    pub algorithm: String,
    /// Key that produced the signature. Informational; verification always
    /// uses the caller's trusted key.
    pub public_key: String,
    pub value: String,
}

#[derive(Serialize)]
struct SignedDocument<'a> {
    #[serde(flatten)]
    document: &'a LicenseDocument,
    signature: SignatureBlock,
}

/// Top-level members in document order, duplicates included.
struct Members(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for Members {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = Members;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a license document object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Members, A::Error> {
                let mut members = Vec::new();
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    members.push(entry);
                }
                Ok(Members(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}

impl LicenseDocument {
    /// Serializes and signs this document.
    pub fn seal(&self, key: &SigningKey) -> LicenseResult<Vec<u8>> {
        let Value::Object(body) = serde_json::to_value(self)? else {
            return Err(LicenseError::InvalidDocument(
                "document did not serialize to an object".to_string(),
            ));
        };
        let canonical = canonical_bytes(&body)?;
        let signature = SignatureBlock {
            reference: String::new(),
            digest_method: DIGEST_METHOD.to_string(),
            digest: sha256_hex(&canonical),
            algorithm: ALGORITHM.to_string(),
            public_key: key.verifying_key().to_base64(),
            value: key.sign(&canonical).to_base64(),
        };

        let bytes = serde_json::to_vec_pretty(&SignedDocument {
            document: self,
            signature,
        })?;
        debug!(uid = %self.uid, bytes = bytes.len(), "sealed license document");
        Ok(bytes)
    }

    /// Verifies `bytes` against `trusted` and deserializes the document.
    ///
    /// Fails with [`LicenseError::SignatureInvalid`] unless there is exactly
    /// one signature block and it verifies. No other field is interpreted
    /// before that.
    pub fn open(bytes: &[u8], trusted: &VerifyingKey) -> LicenseResult<Self> {
        let Members(members) = serde_json::from_slice(bytes)
            .map_err(|e| LicenseError::InvalidDocument(e.to_string()))?;

        let mut signatures = Vec::new();
        let mut body = Map::new();
        for (key, value) in members {
            if key == SIGNATURE_FIELD {
                signatures.push(value);
            } else if body.insert(key.clone(), value).is_some() {
                return Err(LicenseError::InvalidDocument(format!(
                    "duplicate member `{key}`"
                )));
            }
        }

        let block = match signatures.len() {
            0 => {
                return Err(LicenseError::SignatureInvalid(
                    "document is not signed".to_string(),
                ));
            }
            1 => signatures.remove(0),
            n => {
                return Err(LicenseError::SignatureInvalid(format!(
                    "expected one signature block, found {n}"
                )));
            }
        };
        let block: SignatureBlock = serde_json::from_value(block).map_err(|e| {
            LicenseError::SignatureInvalid(format!("malformed signature block: {e}"))
        })?;
        verify_block(&block, &body, trusted)?;

        serde_json::from_value(Value::Object(body))
            .map_err(|e| LicenseError::InvalidDocument(e.to_string()))
    }
}

fn verify_block(
    block: &SignatureBlock,
    body: &Map<String, Value>,
    trusted: &VerifyingKey,
) -> LicenseResult<()> {
    if !block.reference.is_empty() {
        return Err(LicenseError::SignatureInvalid(format!(
            "signature must reference the whole document, not `{}`",
            block.reference
        )));
    }
    if block.algorithm != ALGORITHM || block.digest_method != DIGEST_METHOD {
        return Err(LicenseError::SignatureInvalid(format!(
            "unsupported signature method {}/{}",
            block.algorithm, block.digest_method
        )));
    }

    let canonical = canonical_bytes(body)?;
    if sha256_hex(&canonical) != block.digest {
        return Err(LicenseError::SignatureInvalid(
            "document digest does not match".to_string(),
        ));
    }
    let signature = Signature::from_base64(&block.value)
        .map_err(|e| LicenseError::SignatureInvalid(e.to_string()))?;
    trusted.verify(&canonical, &signature).map_err(|_| {
        LicenseError::SignatureInvalid("signature does not verify against the trusted key".to_string())
    })
}

/// Compact JSON with keys sorted at every level.
fn canonical_bytes(body: &Map<String, Value>) -> LicenseResult<Vec<u8>> {
    let mut out = Vec::new();
    write_object(body, &mut out)?;
    Ok(out)
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> serde_json::Result<()> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push(b'{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        serde_json::to_writer(&mut *out, key)?;
        out.push(b':');
        write_value(&map[key.as_str()], out)?;
    }
    out.push(b'}');
    Ok(())
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> serde_json::Result<()> {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
            Ok(())
        }
        scalar => serde_json::to_writer(&mut *out, scalar),
    }
}
