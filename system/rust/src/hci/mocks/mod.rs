//! Mocks for the HCI layer, for use in test

pub mod mock_transport;
