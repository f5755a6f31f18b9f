// Copyright 2026 Student Portal Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scraping core for a legacy ASP.NET WebForms student portal.
//!
//! The portal has no API. This crate emulates a browser session against it
//! (cookies, bounded redirects, `__VIEWSTATE` postbacks), decodes its
//! windows-1250 pages and mines them with tolerant, multi-selector parsers.
//!
//! ```no_run
//! # async fn demo() -> student_portal::PortalResult<()> {
//! use student_portal::{PortalClient, PortalConfig};
//!
//! let mut client = PortalClient::new(PortalConfig::resolve(None, None))?;
//! client.login("ana.anic", "lozinka").await?;
//! let week = client.timetable().await?;
//! println!("{} lessons this week", week.len());
//! client.logout().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod download;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod pages;
pub mod postback;
pub mod registry;
pub mod session;
pub mod transport;

pub use client::{PortalClient, Week};
pub use config::PortalConfig;
pub use download::DownloadedFile;
pub use error::{PortalError, PortalResult};
pub use extract::documents::{FileEntry, TreeNode};
pub use extract::exams::{ExamEntry, ExamPeriod};
pub use extract::grades::{GradeRow, GradeSummary};
pub use extract::inbox::{Message, MessageDetail, Notification};
pub use extract::payments::{PaymentSummary, PaymentTransaction};
pub use extract::regularity::RegularityRow;
pub use extract::timetable::Lesson;
pub use extract::Extracted;
pub use postback::{build_postback, SelectOption, WebFormsTokens};
pub use registry::SessionRegistry;
pub use session::{AuthState, Session};
pub use transport::{CookieJar, HttpMethod, RawPage, Transport};
