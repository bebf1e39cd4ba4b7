//! Size validation of a written artifact.

/// Why an artifact was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArtifactRejection {
    /// Below the absolute size floor.
    BelowFloor,
    /// Below the required fraction of the declared content length.
    BelowDeclared,
}

/// Checks a finished artifact of `actual` bytes.
///
/// The floor applies whether or not a length was declared; the ratio only
/// when one was.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn check_artifact(
    actual: u64,
    declared: Option<u64>,
    floor: u64,
    min_ratio: f64,
) -> Result<(), ArtifactRejection> {
    if actual < floor {
        return Err(ArtifactRejection::BelowFloor);
    }
    if let Some(declared) = declared
        && (actual as f64) < (declared as f64) * min_ratio
    {
        return Err(ArtifactRejection::BelowDeclared);
    }
    Ok(())
}
