//! Macro for implementing Display and FromStr for status enums
//!
//! Status values written by older tooling carry a mix of English and Korean
//! labels (`대기`, `승인`, `approved`, ...). The generated `FromStr` accepts
//! every alias listed for a variant, case-insensitively, while `Display`
//! (and therefore everything written back to storage) always emits the first,
//! canonical label.
//!
//! # Example
//!
//! ```rust
//! use tradeflow_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ReviewStatus {
//!     Pending,
//!     Approved,
//! }
//!
//! impl_domain_status_conversions!(ReviewStatus {
//!     Pending => "pending" | "대기",
//!     Approved => "approved" | "승인",
//! });
//!
//! assert_eq!("승인".parse::<ReviewStatus>(), Ok(ReviewStatus::Approved));
//! assert_eq!(ReviewStatus::Approved.to_string(), "approved");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: writes the canonical (first) label of each variant
/// - FromStr trait: parses any listed alias, case-insensitively
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str | $alias ...` - Canonical label followed by optional
///   aliases accepted on read
///
/// The `TryFrom<String>` / `From<Enum> for String` pair lets serde route
/// through the same table with `#[serde(try_from = "String", into = "String")]`.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical label written to storage and responses.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                let normalized = s.trim().to_lowercase();
                $(
                    if normalized == $str $(|| normalized == $alias)* {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }

        impl TryFrom<String> for $enum_name {
            type Error = String;

            fn try_from(value: String) -> ::std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$enum_name> for String {
            fn from(value: $enum_name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}
