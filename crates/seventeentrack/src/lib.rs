//! Client for the 17track.net package tracking web API
//!
//! Log in with an account token, then list tracked packages, fetch the
//! per-status summary or register new tracking numbers:
//!
//! ```no_run
//! # async fn run() -> Result<(), seventeentrack::SeventeenTrackError> {
//! let mut client = seventeentrack::Client::new(reqwest::Client::new());
//! if client.profile.login("token").await? {
//!     let packages = client.profile.packages(false, chrono_tz::UTC).await?;
//!     let summary = client.profile.summary(false).await?;
//!     println!("{} packages, {} in transit", packages.len(), summary["In Transit"]);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod package;

pub use client::{Client, Endpoints, Profile, DEFAULT_BUYER_API, DEFAULT_USER_API};
pub use error::{Result, SeventeenTrackError};
pub use package::{
    country_name, package_status, package_type, Package, Summary, PACKAGE_STATUSES,
};
