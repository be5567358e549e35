//! Status bucket translation.
//!
//! Collapses transport-specific status codes into the five coarse buckets
//! used as the `status` label on request metrics.

use std::fmt;

/// Coarse status classification for metrics labeling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusBucket {
    Ok,
    ClientError,
    InternalError,
    Redirection,
    Unknown,
}

impl StatusBucket {
    /// Label value used in metrics.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusBucket::Ok => "ok",
            StatusBucket::ClientError => "client_error",
            StatusBucket::InternalError => "internal_error",
            StatusBucket::Redirection => "redirection",
            StatusBucket::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an HTTP status code.
#[inline]
pub const fn http_bucket(status: u16) -> StatusBucket {
    match status {
        500..=u16::MAX => StatusBucket::InternalError,
        400..=499 => StatusBucket::ClientError,
        300..=399 => StatusBucket::Redirection,
        _ => StatusBucket::Ok,
    }
}

/// Classify a raw gRPC status code.
///
/// Takes the wire value rather than `tonic::Code` so that codes outside
/// the known range land in [`StatusBucket::Unknown`] instead of being
/// folded into `Code::Unknown` (which is an internal error).
pub const fn grpc_bucket(code: i32) -> StatusBucket {
    match code {
        0 => StatusBucket::Ok,
        // Unknown, DeadlineExceeded, Unimplemented, Internal, Unavailable, DataLoss
        2 | 4 | 12 | 13 | 14 | 15 => StatusBucket::InternalError,
        // Cancelled, InvalidArgument, NotFound, AlreadyExists, PermissionDenied,
        // ResourceExhausted, FailedPrecondition, Aborted, OutOfRange, Unauthenticated
        1 | 3 | 5 | 6 | 7 | 8 | 9 | 10 | 11 | 16 => StatusBucket::ClientError,
        _ => StatusBucket::Unknown,
    }
}

/// Classify a `tonic::Code`.
#[inline]
pub fn grpc_code_bucket(code: tonic::Code) -> StatusBucket {
    grpc_bucket(code as i32)
}
