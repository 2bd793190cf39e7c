//! Test doubles for the gap module

pub mod mock_address_delegate;
