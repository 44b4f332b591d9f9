//! Server and virtual machine core formulas
//!
//! Windows Server and SQL Server metrics license physical servers directly
//! and virtual machines through the server hosting them. One combinator
//! handles both tracks; each edition only supplies its per-server and
//! per-host rules through [`HybridFormula`].

use entitle_common::{ComputedLicenses, EquipmentId, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, instrument};

use super::{numeric_row, require_row_len};
use crate::aggregation::rounding::ceil_to_u64;
use crate::context::ComputationContext;
use crate::registry::{attribute_read, HybridTypes};

/// Processor capacity of a physical server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapacity {
    pub cpu: Decimal,
    pub cores: Decimal,
}

impl HostCapacity {
    pub fn new(cpu: Decimal, cores: Decimal) -> Self {
        Self { cpu, cores }
    }
}

/// Per-edition rules of a hybrid metric
pub trait HybridFormula: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Licenses of a server running the product directly
    fn server_value(&self, server: HostCapacity) -> Decimal;

    /// Licenses of a host for the product VMs it runs
    fn host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal;

    /// Host licenses when the product holds software assurance
    fn standalone_host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal;

    /// Capacity assumed for virtual machines without a known host
    fn reference_host(&self) -> HostCapacity;
}

fn windows_server_value(server: HostCapacity) -> Decimal {
    (server.cores.max(dec!(8)) * server.cpu).max(dec!(16))
}

#[derive(Debug)]
pub struct WindowsServerStandard;

impl HybridFormula for WindowsServerStandard {
    fn name(&self) -> &'static str {
        "windows server standard"
    }

    fn server_value(&self, server: HostCapacity) -> Decimal {
        windows_server_value(server)
    }

    fn host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal {
        let vcpu: Decimal = vcpus.iter().copied().sum();
        windows_server_value(host) * vcpu.max(dec!(2)) / dec!(2)
    }

    fn standalone_host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal {
        let vcpu: Decimal = vcpus.iter().copied().sum();
        vcpu.min(windows_server_value(host))
    }

    fn reference_host(&self) -> HostCapacity {
        HostCapacity::new(dec!(1), dec!(8))
    }
}

#[derive(Debug)]
pub struct WindowsServerDatacenter;

impl HybridFormula for WindowsServerDatacenter {
    fn name(&self) -> &'static str {
        "windows server datacenter"
    }

    fn server_value(&self, server: HostCapacity) -> Decimal {
        windows_server_value(server)
    }

    fn host_value(&self, host: HostCapacity, _vcpus: &[Decimal]) -> Decimal {
        windows_server_value(host)
    }

    fn standalone_host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal {
        let capped: Decimal = vcpus.iter().map(|v| (*v).min(dec!(8))).sum();
        capped.min(windows_server_value(host))
    }

    fn reference_host(&self) -> HostCapacity {
        HostCapacity::new(dec!(1), dec!(8))
    }
}

/// SQL Server core rules, shared by Enterprise and Standard
#[derive(Debug)]
pub struct SqlServer {
    name: &'static str,
}

impl SqlServer {
    fn physical(host: HostCapacity) -> Decimal {
        host.cpu * host.cores.max(dec!(4))
    }

    fn virtual_cores(vcpus: &[Decimal]) -> Decimal {
        vcpus.iter().map(|v| (*v).max(dec!(4))).sum()
    }
}

impl HybridFormula for SqlServer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn server_value(&self, server: HostCapacity) -> Decimal {
        Self::physical(server)
    }

    fn host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal {
        let (p, v) = (Self::physical(host), Self::virtual_cores(vcpus));
        // Demand is measured against the host's cores attribute, not cpu x cores
        let demand: Decimal = vcpus.iter().copied().sum();
        if demand <= host.cores {
            p.min(v)
        } else {
            p + v
        }
    }

    fn standalone_host_value(&self, host: HostCapacity, vcpus: &[Decimal]) -> Decimal {
        Self::physical(host).min(Self::virtual_cores(vcpus))
    }

    fn reference_host(&self) -> HostCapacity {
        HostCapacity::new(dec!(1), dec!(4))
    }
}

pub static WINDOWS_SERVER_STANDARD: WindowsServerStandard = WindowsServerStandard;
pub static WINDOWS_SERVER_DATACENTER: WindowsServerDatacenter = WindowsServerDatacenter;
pub static SQL_SERVER_ENTERPRISE: SqlServer = SqlServer {
    name: "sql server enterprise",
};
pub static SQL_SERVER_STANDARD: SqlServer = SqlServer {
    name: "sql server standard",
};

/// Licenses split by track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HybridBreakdown {
    pub server_track: Decimal,
    pub vm_track: Decimal,
}

impl HybridBreakdown {
    pub fn total(&self) -> Decimal {
        self.server_track + self.vm_track
    }
}

/// Evaluate both tracks for already-read capacities
///
/// `hosts` maps each product VM to its host, when known.
pub fn combine(
    formula: &dyn HybridFormula,
    servers: &BTreeMap<EquipmentId, HostCapacity>,
    vms: &BTreeMap<EquipmentId, Decimal>,
    hosts: &HashMap<EquipmentId, EquipmentId>,
    host_capacity: &HashMap<EquipmentId, HostCapacity>,
    software_assurance: bool,
) -> HybridBreakdown {
    let host_value = |host: HostCapacity, vcpus: &[Decimal]| {
        if software_assurance {
            formula.standalone_host_value(host, vcpus)
        } else {
            formula.host_value(host, vcpus)
        }
    };

    let mut by_host: BTreeMap<&EquipmentId, Vec<Decimal>> = BTreeMap::new();
    let mut vm_track = Decimal::ZERO;
    for (vm, vcpu) in vms {
        match hosts.get(vm) {
            Some(host) => by_host.entry(host).or_default().push(*vcpu),
            None => {
                debug!(vm = %vm, "Virtual machine without host, using reference capacity");
                vm_track += host_value(formula.reference_host(), &[*vcpu]);
            }
        }
    }
    for (host, vcpus) in &by_host {
        let capacity = host_capacity
            .get(*host)
            .copied()
            .unwrap_or_else(|| formula.reference_host());
        vm_track += host_value(capacity, vcpus);
    }

    let hosting: HashSet<&EquipmentId> = by_host.keys().copied().collect();
    let server_track = servers
        .iter()
        .filter(|(id, _)| !hosting.contains(id))
        .map(|(_, capacity)| formula.server_value(*capacity))
        .sum();

    HybridBreakdown {
        server_track,
        vm_track,
    }
}

/// Compute a hybrid metric for the products of the context
#[instrument(skip(ctx, types, formula), fields(formula = formula.name()))]
pub async fn hybrid_licenses(
    ctx: &ComputationContext,
    types: &HybridTypes,
    formula: &dyn HybridFormula,
    software_assurance: bool,
) -> Result<ComputedLicenses> {
    let server_ids = ctx.product_equipment(&types.server_type).await?;
    let vm_ids = ctx.product_equipment(&types.vm_type).await?;
    if server_ids.is_empty() && vm_ids.is_empty() {
        return Ok(ComputedLicenses::zero());
    }

    let hosts = ctx.parents(&vm_ids, &types.server_type).await?;
    let capacity_reads = [
        attribute_read(&types.cpu, ctx.simulated()),
        attribute_read(&types.cores, ctx.simulated()),
    ];
    let mut physical: Vec<EquipmentId> = server_ids.clone();
    physical.extend(hosts.values().cloned());
    physical.sort();
    physical.dedup();

    let capacities: HashMap<EquipmentId, HostCapacity> = ctx
        .attribute_values(&physical, &capacity_reads)
        .await?
        .into_iter()
        .map(|(id, row)| {
            require_row_len(&id, &row, capacity_reads.len())?;
            let values = numeric_row(&id, &row);
            Ok((id, HostCapacity::new(values[0], values[1])))
        })
        .collect::<Result<_>>()?;
    let servers: BTreeMap<EquipmentId, HostCapacity> = server_ids
        .iter()
        .map(|id| {
            let capacity = capacities
                .get(id)
                .copied()
                .unwrap_or(HostCapacity::new(Decimal::ZERO, Decimal::ZERO));
            (id.clone(), capacity)
        })
        .collect();

    let vcpu_reads = [attribute_read(&types.vcpu, ctx.simulated())];
    let vcpu_rows = ctx.attribute_values(&vm_ids, &vcpu_reads).await?;
    let vms: BTreeMap<EquipmentId, Decimal> = vm_ids
        .iter()
        .map(|id| {
            let vcpu = match vcpu_rows.get(id) {
                Some(row) => {
                    require_row_len(id, row, vcpu_reads.len())?;
                    numeric_row(id, row)[0]
                }
                None => Decimal::ZERO,
            };
            Ok((id.clone(), vcpu))
        })
        .collect::<Result<_>>()?;

    let breakdown = combine(formula, &servers, &vms, &hosts, &capacities, software_assurance);
    debug!(
        server_track = %breakdown.server_track,
        vm_track = %breakdown.vm_track,
        "Hybrid tracks"
    );
    Ok(ComputedLicenses::new(ceil_to_u64(breakdown.total())?).with_raw_total(breakdown.total()))
}
