//! Customer lifecycle: Waiting -> InService -> removed, or
//! Waiting -> LeavingAngry -> removed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{ServiceDef, TICKS_PER_SECOND};
use std::collections::BTreeSet;
use tracing::debug;

use crate::derive_seed;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CustomerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoomId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CustomerStatus {
    Waiting,
    InService,
    /// Terminal; removed after the grace period.
    LeavingAngry,
}

/// Where the customer should be drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "at", content = "slot", rename_all = "camelCase")]
pub enum CustomerPosition {
    /// 0-based place in the waiting line.
    Queue(usize),
    Room(RoomId),
    Exit,
}

/// The part of a service definition a customer carries with it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTicket {
    pub service_id: String,
    pub price: Decimal,
    pub duration_seconds: f64,
}

impl From<&ServiceDef> for ServiceTicket {
    fn from(s: &ServiceDef) -> Self {
        Self {
            service_id: s.id.clone(),
            price: s.price,
            duration_seconds: s.duration_seconds,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub position: CustomerPosition,
    pub service: ServiceTicket,
    pub status: CustomerStatus,
    pub service_ticks_left: u32,
    pub patience_ticks_left: u32,
    pub max_patience_ticks: u32,
    /// Ticks left before an angry customer is removed.
    pub exit_ticks_left: u32,
    pub room_id: Option<RoomId>,
    pub spawned_at_tick: u64,
}

impl Customer {
    /// A freshly spawned customer at the back of the line.
    pub fn new(id: CustomerId, service: ServiceTicket, max_patience_ticks: u32, tick: u64) -> Self {
        Self {
            id,
            position: CustomerPosition::Queue(0),
            service,
            status: CustomerStatus::Waiting,
            service_ticks_left: 0,
            patience_ticks_left: max_patience_ticks,
            max_patience_ticks,
            exit_ticks_left: 0,
            room_id: None,
            spawned_at_tick: tick,
        }
    }
}

/// `ceil(duration * ticks_per_second / speed)`, never below one tick.
pub fn service_ticks(duration_seconds: f64, service_speed: f64) -> u32 {
    let speed = if service_speed.is_finite() && service_speed > 0.0 {
        service_speed
    } else {
        sim_core::metric::MIN_SERVICE_SPEED
    };
    let ticks = (duration_seconds * f64::from(TICKS_PER_SECOND) / speed).ceil();
    if ticks.is_finite() {
        ticks.clamp(1.0, f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

/// Inputs the lifecycle needs for one tick.
#[derive(Clone, Debug)]
pub struct CustomerContext {
    pub tick: u64,
    pub service_rooms: u32,
    pub service_speed: f64,
    pub happy_probability: f64,
    pub reputation_multiplier: f64,
    pub happy_experience_gain: f64,
    pub angry_experience_penalty: f64,
    pub angry_exit_ticks: u32,
    pub rng_seed: u64,
}

/// A customer whose service completed this tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServedCustomer {
    pub id: CustomerId,
    pub service_id: String,
    pub price: Decimal,
    pub happy: bool,
    pub experience_gain: f64,
}

/// Result of advancing every active customer by one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CustomerStep {
    /// Surviving customers, in arrival order.
    pub active: Vec<Customer>,
    pub served: Vec<ServedCustomer>,
    /// Customers who ran out of patience this tick.
    pub angered: Vec<CustomerId>,
    /// Angry customers whose grace period ended this tick.
    pub departed: Vec<CustomerId>,
    pub revenue: Decimal,
    /// Net experience change: happy gains minus anger penalties.
    pub experience_delta: f64,
}

/// Advance all customers by one tick.
///
/// In-service and leaving customers advance first, so rooms freed this tick
/// are available to waiting customers, who are admitted in arrival order.
/// A customer in service is never preempted, even if the room count shrank.
pub fn step_customers(customers: &[Customer], ctx: &CustomerContext) -> CustomerStep {
    let mut step = CustomerStep::default();
    let mut survivors: Vec<Customer> = Vec::with_capacity(customers.len());

    for c in customers {
        match c.status {
            CustomerStatus::InService => {
                let mut c = c.clone();
                c.service_ticks_left = c.service_ticks_left.saturating_sub(1);
                if c.service_ticks_left == 0 {
                    step.revenue += c.service.price;
                    let served = resolve_service(&c, ctx);
                    step.experience_delta += served.experience_gain;
                    debug!(
                        customer = c.id.0,
                        service = %c.service.service_id,
                        happy = served.happy,
                        "customer served"
                    );
                    step.served.push(served);
                } else {
                    survivors.push(c);
                }
            }
            CustomerStatus::LeavingAngry => {
                let mut c = c.clone();
                c.exit_ticks_left = c.exit_ticks_left.saturating_sub(1);
                if c.exit_ticks_left == 0 {
                    step.departed.push(c.id);
                } else {
                    survivors.push(c);
                }
            }
            CustomerStatus::Waiting => survivors.push(c.clone()),
        }
    }

    let mut occupied: BTreeSet<RoomId> = survivors
        .iter()
        .filter(|c| c.status == CustomerStatus::InService)
        .filter_map(|c| c.room_id)
        .collect();
    let mut queue_slot = 0usize;

    for c in survivors.iter_mut() {
        if c.status != CustomerStatus::Waiting {
            continue;
        }
        c.patience_ticks_left = c.patience_ticks_left.saturating_sub(1);
        if let Some(room) = free_room(&occupied, ctx.service_rooms) {
            occupied.insert(room);
            c.status = CustomerStatus::InService;
            c.room_id = Some(room);
            c.position = CustomerPosition::Room(room);
            c.service_ticks_left = service_ticks(c.service.duration_seconds, ctx.service_speed);
        } else if c.patience_ticks_left == 0 {
            c.status = CustomerStatus::LeavingAngry;
            c.position = CustomerPosition::Exit;
            c.exit_ticks_left = ctx.angry_exit_ticks.max(1);
            step.experience_delta -= ctx.angry_experience_penalty;
            step.angered.push(c.id);
            debug!(customer = c.id.0, "customer left angry");
        } else {
            c.position = CustomerPosition::Queue(queue_slot);
            queue_slot += 1;
        }
    }

    step.active = survivors;
    step
}

fn free_room(occupied: &BTreeSet<RoomId>, rooms: u32) -> Option<RoomId> {
    if occupied.len() >= rooms as usize {
        return None;
    }
    (0..rooms).map(RoomId).find(|r| !occupied.contains(r))
}

fn resolve_service(c: &Customer, ctx: &CustomerContext) -> ServedCustomer {
    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(ctx.rng_seed, ctx.tick, c.id.0));
    let roll: f64 = rng.gen();
    let happy = roll < ctx.happy_probability;
    let experience_gain = if happy {
        ctx.happy_experience_gain * ctx.reputation_multiplier
    } else {
        0.0
    };
    ServedCustomer {
        id: c.id,
        service_id: c.service.service_id.clone(),
        price: c.service.price,
        happy,
        experience_gain,
    }
}
