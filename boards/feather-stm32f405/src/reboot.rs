//! Reset orchestration for the retention self-test
//!
//! Owns the one ordering rule that matters at the reset boundary: the boot
//! counter write must reach the retained RAM before the reset is issued.
#![deny(unsafe_code)]
#![deny(warnings)]

use core::sync::atomic::{compiler_fence, Ordering};

use defmt::{info, warn};
use hal_abstractions::TickCounter;
use retained_clock_core::{FormattedMicros, RetainedState, RetainedStore};

/// Log the retained block as found at boot
pub fn report_retained(valid: bool, state: &RetainedState) {
    info!(
        "Retained RAM: {}",
        if valid { "VALID" } else { "INVALID (first boot)" }
    );
    if !valid {
        return;
    }
    info!("=== Retained Data ===");
    info!("  boots:         {}", state.boots);
    info!("  off_count:     {}", state.off_count);
    info!("  uptime_latest: {} ticks", state.uptime_latest);
    info!(
        "  uptime_sum:    {} ticks ({})",
        state.uptime_sum,
        FormattedMicros(state.uptime_sum)
    );
    info!("  crc:           {:#x}", state.crc);
}

/// Record the boot, flush the retained block, and reset the SoC
pub fn force_reset<C: TickCounter>(store: &mut RetainedStore<'_, C>) -> ! {
    let before = store.counter().read();
    warn!("BEFORE RESET:");
    warn!("  counter: {} us ({})", before, FormattedMicros(before));
    warn!(">>> counter should continue from {} us", before);

    store.record_boot();
    store.update();

    let state = store.state();
    warn!(
        ">>> Saved retained data: boots={}, off_count={}, uptime_sum={}",
        state.boots, state.off_count, state.uptime_sum
    );

    flush();
    cortex_m::peripheral::SCB::sys_reset()
}

/// Make every retained-RAM write visible before anything that follows
fn flush() {
    compiler_fence(Ordering::SeqCst);
    cortex_m::asm::dsb();
}
