//! HTTP REST API for facility climate monitoring.
//!
//! This crate provides a service that:
//! - Stores temperature and humidity readings for air-conditioning units
//! - Evaluates each reading against configurable threshold bounds
//! - Aggregates statistics per unit, per location and facility-wide
//! - Keeps a maintenance log with optional image attachments
//! - Authenticates requests with session tokens and role-based access
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check (no auth required)
//! - `POST /api/auth/login` - Exchange credentials for a session token
//! - `POST /api/auth/logout` - Invalidate the caller's token
//! - `GET/POST /api/units` - List and register units
//! - `GET/PUT/DELETE /api/units/:id` - Manage one unit
//! - `GET /api/units/:id/readings` - Readings for one unit
//! - `GET /api/units/:id/stats` - Statistics for one unit
//! - `GET /api/locations` - Distinct unit locations
//! - `GET/POST /api/readings` - Query and submit readings
//! - `DELETE /api/readings/:id` - Remove an erroneous reading
//! - `GET /api/stats` - Facility-wide statistics
//! - `GET /api/stats/units` - Statistics grouped by unit
//! - `GET /api/stats/locations` - Statistics grouped by location
//! - `GET/POST /api/thresholds` - Threshold configs (`unit_id`, `global_only` filters)
//! - `GET/PUT/DELETE /api/thresholds/:id` - Manage one config
//! - `GET/POST /api/maintenance` - Maintenance log
//! - `GET/DELETE /api/maintenance/:id` - One maintenance record
//! - `GET /api/maintenance/:id/attachment` - Download the attachment
//! - `GET/POST /api/users` - Accounts (admin only)
//! - `PUT/DELETE /api/users/:username` - Manage one account
//! - `GET /api/export/{readings,units,maintenance}.csv` - CSV export
//!
//! Statistics and export endpoints accept `?period=week|month|year|all`
//! and the same filters as the readings endpoints.
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/hvacmon/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/hvacmon/data.db"
//!
//! [auth]
//! admin_username = "admin"
//! admin_password = "admin"
//! session_ttl_secs = 28800
//! ```
//!
//! The `[auth]` credentials seed a default admin account the first time
//! the service starts against an empty database. Change the password
//! through the accounts API afterwards.

pub mod api;
pub mod auth;
pub mod config;
pub mod state;

pub use config::{AuthConfig, Config, ConfigError, ServerConfig, StorageConfig};
pub use state::{AppState, AuthUser};
