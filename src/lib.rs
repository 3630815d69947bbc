/*!
# GleeManager

Business administration backend with a shared holiday calendar.

## Overview

GleeManager keeps the records a small company needs day to day: users,
companies and their projects, driven routes with monthly kilometer maps,
holiday requests with an approval workflow, and Excel templates. At its
core sits the holiday calendar: approved holidays of every user are laid
out over a month grid in stable horizontal lanes, and an administrator can
preview a pending request on top of it before deciding.

## Architecture

### Calendar core (`calendar`, always built)
- Span Extractor - groups holiday days into runs of consecutive days
- Slot Assigner - gives every owner one lane for the whole month, first fit
- Preview Overlay - lays a request over the finished assignment
- Preview transition - fade in/out state of the preview lane
- Month layout - the drawable spans, colors and comments of one month

### Service layer (`web` feature)
- **Technologies**: Rust, axum, tokio
- Document store - one JSON file per collection, in memory behind locks
- Authentication - argon2 password hashes, expiring server-side sessions
- Workbook export - kilometer maps and holiday overviews as XLSX
- Snapshots - gzip-compressed bincode backups of the whole database

## Modules

- **calendar**: span, slot, preview and layout computation
- **models**: record types of the collections
- **store**: JSON document collections
- **auth**: login, sessions and the authentication middleware
- **users**, **companies**, **mileage**, **holidays**, **templates**, **admin**: HTTP handlers
- **export**: XLSX and CSV generation
- **snapshot**: backup and restore
- **config**, **logging**, **error**, **validate**: ambient plumbing
- **app**: routing and server start-up
*/

pub mod calendar;

#[cfg(feature = "web")]
pub mod admin;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod auth;
#[cfg(feature = "web")]
pub mod companies;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod error;
#[cfg(feature = "web")]
pub mod export;
#[cfg(feature = "web")]
pub mod holidays;
#[cfg(feature = "web")]
pub mod logging;
#[cfg(feature = "web")]
pub mod mileage;
#[cfg(feature = "web")]
pub mod models;
#[cfg(feature = "web")]
pub mod snapshot;
#[cfg(feature = "web")]
pub mod store;
#[cfg(feature = "web")]
pub mod templates;
#[cfg(feature = "web")]
pub mod users;
#[cfg(feature = "web")]
pub mod validate;

pub use calendar::*;
