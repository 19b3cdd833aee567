use std::error::Error;
use std::io::Write;

use clap::Parser;
use env_logger::Builder;
use log::{info, warn};
use serde::Serialize;

use dslab_placement::config::PlacementConfig;
use dslab_placement::placement_policy::PlacementPolicy;
use dslab_placement::vm::{SimpleVm, Vm};

#[derive(Serialize)]
struct PlacementRecord {
    vm: String,
    host: String,
    pes: u32,
}

fn init_logger() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

/// Places all VMs in config order, VMs that fit nowhere stay unallocated.
fn place_vms(policy: &mut PlacementPolicy, vms: &[SimpleVm]) {
    for vm in vms {
        if let Err(e) = policy.allocate(vm) {
            warn!("{}", e);
        }
    }
}

/// Applies optimizer directives until it has nothing to recommend or the round limit is reached.
fn rebalance(policy: &mut PlacementPolicy, vms: &[SimpleVm], rounds: u32) -> Result<(), Box<dyn Error>> {
    for round in 0..rounds {
        let batch: Vec<&dyn Vm> = vms.iter().map(|vm| vm as &dyn Vm).collect();
        let directives = policy.optimize_allocation(&batch);
        if directives.is_empty() {
            info!("round {}: placement is balanced", round);
            break;
        }
        info!("round {}: {} migrations recommended", round, directives.len());
        for directive in directives {
            let vm = match vms.iter().find(|vm| vm.uid() == directive.vm) {
                Some(vm) => vm,
                None => continue,
            };
            if let Err(e) = policy.migrate_to(vm, directive.target_host) {
                warn!("migration of vm {} failed: {}", directive.vm, e);
            }
        }
        policy.verify()?;
    }
    Ok(())
}

fn print_summary(policy: &PlacementPolicy, vm_count: usize) {
    let capacity = policy.capacity();
    println!("{:<12} {:>6} {:>6} {:>6} {:>4}", "host", "total", "free", "load", "vms");
    for host in 0..policy.host_count() {
        println!(
            "{:<12} {:>6} {:>6} {:>6.2} {:>4}",
            policy.host_name(host),
            capacity.total_pes(host),
            capacity.free_pes(host),
            capacity.load(host),
            policy.allocations().vms_on(host).len()
        );
    }
    println!(
        "allocated {} of {} vms, {} of {} PEs free",
        policy.allocations().len(),
        vm_count,
        capacity.total_free(),
        capacity.total_capacity()
    );
}

fn save_placements(policy: &PlacementPolicy, path: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for (vm, allocation) in policy.allocations().iter() {
        wtr.serialize(PlacementRecord {
            vm: vm.to_string(),
            host: policy.host_name(allocation.host),
            pes: allocation.pes,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
/// Worst-fit VM placement demo
struct Args {
    /// Path to YAML config with hosts and VMs
    #[clap(long, short, default_value = "config.yaml")]
    config: String,

    /// Path to CSV file for the final placement (optional)
    #[clap(long, short)]
    output: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let args = Args::parse();

    let config = PlacementConfig::from_file(&args.config)?;
    let mut policy = PlacementPolicy::from_config(&config)?;
    let vms = config.build_vms();

    place_vms(&mut policy, &vms);
    rebalance(&mut policy, &vms, config.rebalance_rounds)?;
    print_summary(&policy, vms.len());

    if let Some(path) = args.output {
        save_placements(&policy, &path)?;
    }
    Ok(())
}
