//! Workaround for the status endpoint's malformed JSON document.
//!
//! The instrument's `/mmsp/status/get` document embeds an `errorLog` array
//! whose raw entries collide with the prefix of the following `filaments`
//! array, so a single-pass JSON parser cannot tell where one region ends
//! and the other begins. The text before the `errorLog` landmark is
//! concatenated with the text from one byte before the `filaments` landmark
//! onward (picking up its opening quote), yielding a syntactically valid
//! document containing only the fields this driver consumes.
//!
//! This is a targeted vendor-API workaround for one endpoint's document
//! shape, not a general parsing strategy.
//!
//! TODO: remove once vendor firmware emits a well-formed error log.

use std::borrow::Cow;

use crate::error::{RgaError, RgaResult};

/// Start of the region to cut (the malformed error log).
pub const CUT_LANDMARK: &str = "\"errorLog\"";
/// Field landmark (name plus the key/value syntax that follows it) one byte
/// after where the document resumes; the byte before is its opening quote.
/// The error-log entries mention filaments too, so the bare word is not
/// specific enough to anchor on.
pub const RESUME_LANDMARK: &str = "filaments\":[";

/// Splice the raw status document around the malformed error-log region.
///
/// Documents without an `errorLog` field pass through unchanged.
pub fn splice_status_document(raw: &str) -> RgaResult<Cow<'_, str>> {
    let Some(cut) = raw.find(CUT_LANDMARK) else {
        return Ok(Cow::Borrowed(raw));
    };

    let resume = raw[cut..]
        .find(RESUME_LANDMARK)
        .map(|rel| cut + rel)
        .ok_or_else(|| {
            RgaError::decode(
                "status",
                "error-log region present but no filaments field follows",
            )
        })?;

    // One byte back to keep the opening quote of "filaments".
    let tail = raw.get(resume - 1..).ok_or_else(|| {
        RgaError::decode("status", "splice landmark not on a character boundary")
    })?;
    Ok(Cow::Owned(format!("{}{}", &raw[..cut], tail)))
}
