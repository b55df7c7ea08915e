//! Factory connectors.
//!
//! A connector hands items to whatever machine pulls from it. Pulling is
//! two native operations: `grab_output` is the outer call, and it calls
//! `grab_output_inventory` once, or twice when the first attempt finds the
//! inventory empty and a refill from the input side succeeds. Both go
//! through seams, so a hook sees several overlapping calls for what is a
//! single transfer.

use std::collections::VecDeque;
use std::sync::Arc;

use hookline_types::{Capability, ItemStack, ObjectId};
use parking_lot::Mutex;

use super::{Emitter, NativeSeams};

/// Shared view of the two grab operations' arguments.
pub trait GrabCall {
    /// The connector being pulled from.
    fn connector(&self) -> ObjectId;
    /// The item taken, once the original call has run.
    fn item(&self) -> Option<&ItemStack>;
}

/// Arguments of `FactoryConnector::grab_output`.
#[derive(Debug, Clone)]
pub struct GrabOutput {
    /// The connector being pulled from.
    pub connector: ObjectId,
    /// Out: the item taken.
    pub item: Option<ItemStack>,
    /// Out: how far along the connector the item was.
    pub offset: f32,
    /// Only take items with this descriptor.
    pub filter: Option<String>,
}

/// Arguments of `FactoryConnector::grab_output_inventory`.
#[derive(Debug, Clone)]
pub struct GrabOutputInventory {
    /// The connector being pulled from.
    pub connector: ObjectId,
    /// Out: the item taken.
    pub item: Option<ItemStack>,
    /// Only take items with this descriptor.
    pub filter: Option<String>,
}

impl GrabCall for GrabOutput {
    fn connector(&self) -> ObjectId {
        self.connector
    }

    fn item(&self) -> Option<&ItemStack> {
        self.item.as_ref()
    }
}

impl GrabCall for GrabOutputInventory {
    fn connector(&self) -> ObjectId {
        self.connector
    }

    fn item(&self) -> Option<&ItemStack> {
        self.item.as_ref()
    }
}

/// A factory connector in the world.
#[derive(Debug)]
pub struct FactoryConnector {
    id: ObjectId,
    name: String,
    capabilities: Vec<Capability>,
    seams: Arc<NativeSeams>,
    inventory: Mutex<VecDeque<ItemStack>>,
    input: Mutex<VecDeque<ItemStack>>,
}

impl FactoryConnector {
    pub(crate) fn new(id: ObjectId, name: String, seams: Arc<NativeSeams>) -> Self {
        Self {
            id,
            name,
            capabilities: vec![Capability::FactoryConnector],
            seams,
            inventory: Mutex::new(VecDeque::new()),
            input: Mutex::new(VecDeque::new()),
        }
    }

    /// Put an item straight into the connector's inventory.
    pub fn stock(&self, stack: ItemStack) {
        self.inventory.lock().push_back(stack);
    }

    /// Queue an item on the input side; it reaches the inventory on the
    /// next refill.
    pub fn push_input(&self, stack: ItemStack) {
        self.input.lock().push_back(stack);
    }

    /// Items ready to be grabbed.
    pub fn inventory_len(&self) -> usize {
        self.inventory.lock().len()
    }

    /// Items waiting on the input side.
    pub fn input_len(&self) -> usize {
        self.input.lock().len()
    }

    /// Pull one item out of the connector (native operation).
    pub fn grab_output(&self, filter: Option<&str>) -> Option<ItemStack> {
        let mut args = GrabOutput {
            connector: self.id,
            item: None,
            offset: 0.0,
            filter: filter.map(str::to_owned),
        };
        let grabbed = self
            .seams
            .grab_output
            .call(&mut args, &|args: &mut GrabOutput| self.grab_output_native(args));
        if grabbed { args.item } else { None }
    }

    /// Pull one item from the connector's inventory (native operation).
    pub fn grab_output_inventory(&self, filter: Option<&str>) -> Option<ItemStack> {
        let mut args = GrabOutputInventory {
            connector: self.id,
            item: None,
            filter: filter.map(str::to_owned),
        };
        let grabbed = self
            .seams
            .grab_output_inventory
            .call(&mut args, &|args: &mut GrabOutputInventory| {
                self.take_from_inventory(args)
            });
        if grabbed { args.item } else { None }
    }

    fn grab_output_native(&self, args: &mut GrabOutput) -> bool {
        let filter = args.filter.clone();
        let mut item = self.grab_output_inventory(filter.as_deref());
        if item.is_none() && self.refill() {
            item = self.grab_output_inventory(filter.as_deref());
        }
        args.offset = 0.0;
        args.item = item;
        args.item.is_some()
    }

    fn take_from_inventory(&self, args: &mut GrabOutputInventory) -> bool {
        let mut inventory = self.inventory.lock();
        let position = inventory.iter().position(|stack| {
            args.filter
                .as_deref()
                .is_none_or(|wanted| stack.item == wanted)
        });
        args.item = position.and_then(|index| inventory.remove(index));
        args.item.is_some()
    }

    fn refill(&self) -> bool {
        let moved: Vec<ItemStack> = self.input.lock().drain(..).collect();
        if moved.is_empty() {
            return false;
        }
        self.inventory.lock().extend(moved);
        true
    }
}

impl Emitter for FactoryConnector {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn as_connector(&self) -> Option<&FactoryConnector> {
        Some(self)
    }
}
