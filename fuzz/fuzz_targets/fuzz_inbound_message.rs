//! Fuzz target: `InboundMessage::parse` and `PumpService::handle_message`
//!
//! Arbitrary bytes from the console or a transport must never panic the
//! parser, and a rejected message must leave the shared parameter block
//! untouched.  Accepted updates must still validate.
//!
//! cargo fuzz run fuzz_inbound_message

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use pulsepump::app::commands::InboundMessage;
use pulsepump::app::service::PumpService;
use pulsepump::app::shared::Fabric;
use pulsepump::params::PumpParameters;

fuzz_target!(|data: &[u8]| {
    let parsed = InboundMessage::parse(data);

    let service = PumpService::new(Arc::new(Fabric::new(PumpParameters::default())));
    let before = service.fabric().params.snapshot();
    let handled = service.handle_message(data);

    if parsed.is_err() {
        assert!(handled.is_err(), "unparseable message was accepted");
    }
    let after = service.fabric().params.snapshot();
    if handled.is_err() {
        assert_eq!(after, before, "rejected message changed parameters");
    }
    assert!(after.validate().is_ok(), "invalid block reached shared state");
});
