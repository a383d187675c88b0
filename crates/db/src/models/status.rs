//! Status ids mapping to the SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed data in the corresponding
//! `*_statuses` table.

use scriptforge_core::error::CoreError;
use scriptforge_core::execution::ExecutionStatus;
use scriptforge_core::job::JobStatus;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident => $domain:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a status by its database ID.
            pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
                match id {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Internal(format!(
                        "Unknown {} id {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl From<$domain> for $name {
            fn from(value: $domain) -> Self {
                match value {
                    $( $domain::$variant => $name::$variant, )+
                }
            }
        }

        impl From<$name> for $domain {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $domain::$variant, )+
                }
            }
        }
    };
}

define_status_enum! {
    /// Job lifecycle status (`job_statuses`).
    JobStatusId => JobStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Script execution status (`execution_statuses`).
    ExecutionStatusId => ExecutionStatus {
        Queued = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Timeout = 5,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatusId::Pending.id(), 1);
        assert_eq!(JobStatusId::Processing.id(), 2);
        assert_eq!(JobStatusId::Completed.id(), 3);
        assert_eq!(JobStatusId::Failed.id(), 4);
    }

    #[test]
    fn execution_status_ids_match_seed_data() {
        assert_eq!(ExecutionStatusId::Queued.id(), 1);
        assert_eq!(ExecutionStatusId::Running.id(), 2);
        assert_eq!(ExecutionStatusId::Completed.id(), 3);
        assert_eq!(ExecutionStatusId::Failed.id(), 4);
        assert_eq!(ExecutionStatusId::Timeout.id(), 5);
    }

    #[test]
    fn domain_statuses_round_trip_through_ids() {
        for status in [
            ExecutionStatus::Queued,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Timeout,
        ] {
            let id = ExecutionStatusId::from(status).id();
            let back: ExecutionStatus = ExecutionStatusId::from_id(id).unwrap().into();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_id_is_an_error() {
        assert_matches!(JobStatusId::from_id(9), Err(CoreError::Internal(_)));
    }
}
