//! Helpers for integration tests: throwaway databases, catalog seeding and stand-ins for the courier network and the
//! payment gateway.
pub mod flows;
pub mod prepare_env;
pub mod seed;
pub mod stubs;
