//! Adapters to external collaborators.

pub mod hotel_service;
