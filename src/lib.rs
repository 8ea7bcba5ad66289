#![doc = "somnosync: scheduled sync-and-upload for therapy-device data."]

//! Pulls device data from a WebDAV-accessible directory via rclone, packages
//! newly observed data into a dated zip archive, and uploads the archive to
//! the Somnolog analysis service through its OAuth-protected REST API.
//!
//! The pipeline is strictly sequential and every failure is terminal; see
//! [`error::RunError`] for the exit-code taxonomy. External collaborators
//! (sync tool, archive tool, token endpoint, analysis API) sit behind traits
//! in their modules so the orchestration is testable without a device or a
//! network.

pub mod archive;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod download;
pub mod environment;
pub mod error;
pub mod load_config;
pub mod logging;
pub mod synchronise;
pub mod upload;
