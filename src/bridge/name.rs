use super::BridgeError;
use crate::record::LogKey;

/// Split a build's addressable name `stream/build/` into its log key.
///
/// The name must end in `/`; the last segment is the build id and everything
/// before it is the stream.
pub fn parse_build_name(name: &str) -> Result<LogKey, BridgeError> {
    let invalid = || BridgeError::InvalidBuildName(name.to_string());

    let trimmed = name.strip_suffix('/').ok_or_else(invalid)?;
    let (stream, build) = trimmed.rsplit_once('/').ok_or_else(invalid)?;
    if stream.is_empty() || build.is_empty() {
        return Err(invalid());
    }
    Ok(LogKey::new(stream, build))
}
