/*!
# Fill Rate Dashboard

A browser-based dashboard for purchase order fill rates, built in Rust.

## Overview

Buyers upload a CSV or Excel extract of purchase order lines. The dashboard
filters it by manufacturer, category, subcategory and warehouse, shows the
headline quantities and fill rates, draws one chart per grouping and lets the
filtered rows, chart summaries and a PDF report be downloaded or mailed.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript
- **Key Components**:
  - Upload form - Sends the file to the server
  - Filter sidebar - Dropdowns and multiselects built from the data
  - Metric cards - KPI totals and fill rates
  - Chart panels - PNG charts rendered server side, with download and email actions

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Loader - CSV and Excel parsing into a typed table
  - Profile - Which columns are KPIs, rates, filters and charts
  - Filter engine - Single and multi value column filters
  - Metrics - Totals, fill rates and group-by aggregation
  - Session store - Per-browser table and last filter selections

### Export Layer
- CSV and XLSX download of the filtered rows
- XLSX download of each chart's aggregated series
- PDF summary with metrics and chart images
- Email of a chart image through a configured SMTP relay

## Modules

- **error**: The crate-wide error type
- **table**: Cell values and the in-memory table
- **loader**: CSV/Excel loading
- **profile**: Dashboard profiles (built-in and JSON)
- **filter**: Filter selections and their application
- **metrics**: KPI totals, fill rates and grouping
- **dashboard**: Ties a table and a profile into a rendered view
- **session**: Per-user state with expiry
- **graph**: Bar and pie chart rendering
- **downloader**: Export functionality (CSV, XLSX)
- **report**: PDF summary
- **config**: File and environment configuration
- **mailer**: Report email (web feature)
- **app**: Routing and handlers (web feature)

## REST API Endpoints

- `POST /api/upload` - Load a file into the session
- `GET|POST /api/dashboard` - Current view, optionally with new filter selections
- `GET /api/chart/{name}` - Chart as PNG
- `GET /api/export/csv`, `/api/export/xlsx` - Filtered rows
- `GET /api/export/summary/{name}` - Aggregated series of one chart
- `GET /api/export/pdf` - PDF summary
- `POST /api/email` - Mail a chart image
*/

pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod mailer;
pub mod metrics;
pub mod profile;
pub mod report;
pub mod session;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

pub use config::AppConfig;
pub use dashboard::{Dashboard, DashboardView};
pub use error::{DashboardError, Result};
pub use filter::{FilterSet, Selection};
pub use profile::DashboardProfile;
pub use table::{Table, Value};
