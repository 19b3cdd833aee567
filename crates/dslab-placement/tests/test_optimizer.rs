use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use dslab_placement::allocation_optimizer::{allocation_optimizer_resolver, MigrationDirective};
use dslab_placement::allocation_optimizers::pe_rebalancer::PeRebalancer;
use dslab_placement::error::ConfigError;
use dslab_placement::host::{Host, SimpleHost};
use dslab_placement::placement_policy::PlacementPolicy;
use dslab_placement::vm::{SimpleVm, Vm};

fn make_policy(pes: &[u32], threshold: f64) -> PlacementPolicy {
    let hosts = pes
        .iter()
        .enumerate()
        .map(|(i, pes)| rc!(refcell!(SimpleHost::new(&format!("h{}", i + 1), *pes))) as Rc<RefCell<dyn Host>>)
        .collect();
    PlacementPolicy::new(hosts).with_optimizer(Box::new(PeRebalancer::new(threshold)))
}

fn batch(vms: &[SimpleVm]) -> Vec<&dyn Vm> {
    vms.iter().map(|vm| vm as &dyn Vm).collect()
}

#[test]
// Default optimizer never proposes migrations.
fn test_no_optimization() {
    let hosts = vec![rc!(refcell!(SimpleHost::new("h", 4))) as Rc<RefCell<dyn Host>>];
    let mut policy = PlacementPolicy::new(hosts);
    let vms = vec![SimpleVm::new(0, 0, 4)];
    policy.allocate(&vms[0]).unwrap();

    assert_eq!(policy.capacity().load(0), 1.);
    assert!(policy.optimize_allocation(&batch(&vms)).is_empty());
}

#[test]
// VMs are moved away from an overloaded host until its load drops to the threshold.
fn test_rebalancer_moves_vms() {
    let mut policy = make_policy(&[8, 8, 8], 0.75);
    let vms = vec![SimpleVm::new(0, 0, 4), SimpleVm::new(1, 0, 2), SimpleVm::new(2, 0, 2)];
    for vm in &vms {
        policy.allocate_on(vm, 0).unwrap();
    }

    let directives = policy.optimize_allocation(&batch(&vms));
    assert_eq!(
        directives,
        vec![MigrationDirective {
            vm: vms[0].uid(),
            target_host: 1
        }]
    );

    for directive in &directives {
        let vm = vms.iter().find(|vm| vm.uid() == directive.vm).unwrap();
        policy.migrate_to(vm, directive.target_host).unwrap();
    }
    assert_eq!(policy.capacity().free_pes_list(), vec![4, 4, 8]);
    assert!(policy.optimize_allocation(&batch(&vms)).is_empty());
    policy.verify().unwrap();
}

#[test]
// Directives of one round never push a target over the threshold.
fn test_rebalancer_respects_targets() {
    let mut policy = make_policy(&[4, 4], 0.75);
    let vms = vec![SimpleVm::new(0, 0, 2), SimpleVm::new(1, 0, 2), SimpleVm::new(2, 0, 2)];
    policy.allocate_on(&vms[0], 0).unwrap();
    policy.allocate_on(&vms[1], 0).unwrap();
    policy.allocate_on(&vms[2], 1).unwrap();

    assert!(policy.optimize_allocation(&batch(&vms)).is_empty());
}

#[test]
// Only VMs from the batch are considered and every target receives at most what fits under the threshold.
fn test_rebalancer_uses_batch() {
    let mut policy = make_policy(&[10, 10, 10], 0.5);
    let vms: Vec<SimpleVm> = (0..5).map(|id| SimpleVm::new(id, 0, 2)).collect();
    for vm in &vms {
        policy.allocate_on(vm, 0).unwrap();
    }

    assert!(policy.optimize_allocation(&batch(&vms[..1])).len() == 1);

    let directives = policy.optimize_allocation(&batch(&vms));
    assert_eq!(
        directives,
        vec![
            MigrationDirective {
                vm: vms[0].uid(),
                target_host: 1
            },
            MigrationDirective {
                vm: vms[1].uid(),
                target_host: 2
            },
            MigrationDirective {
                vm: vms[2].uid(),
                target_host: 1
            },
        ]
    );
}

#[test]
fn test_optimizer_resolver() {
    assert!(allocation_optimizer_resolver("NoOptimization").is_ok());
    assert!(allocation_optimizer_resolver("PeRebalancer").is_ok());
    assert!(allocation_optimizer_resolver("PeRebalancer[threshold=0.6]").is_ok());
    assert!(matches!(
        allocation_optimizer_resolver("Unknown"),
        Err(ConfigError::UnknownOptimizer(_))
    ));
    assert!(matches!(
        allocation_optimizer_resolver("PeRebalancer[threshold=high]"),
        Err(ConfigError::BadOption { .. })
    ));

    assert_eq!(PeRebalancer::from_options("threshold=0.6").unwrap().threshold(), 0.6);
    assert_eq!(PeRebalancer::from_options("").unwrap().threshold(), 0.8);
    assert!(PeRebalancer::from_options("threshold=1.5").is_err());

    assert!(matches!(
        allocation_optimizer_resolver("PeRebalancer[treshold=0.5]"),
        Err(ConfigError::BadOption { .. })
    ));
    assert!(matches!(
        PeRebalancer::from_options("threshold=0.6,treshold=0.5"),
        Err(ConfigError::BadOption { .. })
    ));
}
