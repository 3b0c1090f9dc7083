//! Macro for implementing Display and FromStr for status enums
//!
//! Generates a single lowercase string mapping used for both directions,
//! with case-insensitive parsing.
//!
//! # Example
//!
//! ```rust
//! use innkeeper_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ProbeKind {
//!     Tcp,
//!     Http,
//! }
//!
//! impl_domain_status_conversions!(ProbeKind {
//!     Tcp => "tcp",
//!     Http => "http",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Pending,
        ManualReview,
    }

    impl_domain_status_conversions!(TestStatus {
        Pending => "pending",
        ManualReview => "manual_review",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(TestStatus::Pending.to_string(), "pending");
        assert_eq!(TestStatus::ManualReview.to_string(), "manual_review");
    }

    #[test]
    fn test_fromstr_case_insensitive() {
        assert_eq!(TestStatus::from_str("PENDING").unwrap(), TestStatus::Pending);
        assert_eq!(TestStatus::from_str("Manual_Review").unwrap(), TestStatus::ManualReview);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = TestStatus::from_str("done").unwrap_err();
        assert_eq!(err, "Invalid TestStatus: done");
    }
}
