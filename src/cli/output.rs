use crate::project::ReleaseReport;
use crate::system::SlotStatus;

pub fn print_release_report(report: &ReleaseReport) {
    println!("Release complete");
    println!("================");
    println!("  previous slot: {}", report.previous_slot.display());
    println!("  live slot:     {}", report.live_slot.display());
    println!();
    println!("Updated modules ({}):", report.modules.len());
    for module in &report.modules {
        println!("  • {}", module.display());
    }
}

pub fn print_slot_status(status: &SlotStatus) {
    println!("Live link: {}", status.live_link.display());
    match &status.active {
        Some(active) => println!("  active:   {}", active.display()),
        None => println!("  active:   (not deployed yet)"),
    }
    println!("  inactive: {}", status.inactive.display());
}
