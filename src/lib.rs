//! cert-manager DNS-01 webhook solver for Yandex Cloud DNS.
//!
//! [`provider::DnsProvider`] creates and removes challenge TXT records,
//! [`solver::YandexSolver`] adapts it to cert-manager challenge requests and
//! [`api`] serves those requests over HTTP, wrapped in TLS by [`tls`].

pub mod api;
pub mod config;
pub mod provider;
pub mod secrets;
pub mod solver;
pub mod tls;
