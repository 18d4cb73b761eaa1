//! Reactive client-side annotation agent
//!
//! A single-threaded, cooperatively-scheduled process over the abstract DOM.
//! It waits for the checkout root to mount (bounded polling), runs a fixed
//! schedule of bootstrap re-scans to absorb the UI framework's staged
//! rendering, discovers shadow roots as their hosts upgrade, and thereafter
//! reacts to mutations through a debounced re-scan. Every insertion point is
//! marker-guarded, so a scan is always safe to repeat.
//!
//! Time is a virtual millisecond clock driven by the host via
//! [`DomAnnotationAgent::advance_to`]; there is no parallelism and no timer
//! thread, which keeps every scenario deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

use log::{debug, trace};

use crate::config::{ClientSettings, PricingConfig};
use crate::convert::{Converter, CurrencyFormatter};
use crate::dom::{self, Document, NodeId, NodeKind, NodeRef, Selector, SHADOW_ROOT_TAG};
use crate::error::SkipReason;
use crate::pricetext::PriceTextParser;

/// Lifecycle states of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Checkout root not yet mounted; polling
    Waiting,
    /// Root found; fixed schedule of delayed full re-scans running
    Bootstrapping,
    /// Mutation-driven; re-scans are debounced
    Observing,
    /// Polling abandoned; the root never appeared within the budget
    TerminatedWatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Task {
    PollRoot,
    Rescan,
    ShadowDiscovery,
    DebouncedScan(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due: u64,
    seq: u64,
    task: Task,
}

/// The client-resident annotation process.
pub struct DomAnnotationAgent {
    config: Rc<PricingConfig>,
    converter: Converter,
    formatter: Rc<dyn CurrencyFormatter>,
    parser: PriceTextParser,
    document: Rc<Document>,
    state: AgentState,
    now: u64,
    watch_started: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
    debounce_generation: u64,
    debounce_pending: bool,
    observed: HashSet<NodeId>,
    checkout_root: Option<NodeRef>,
    bootstrap_remaining: usize,
    scans_completed: u64,
}

impl DomAnnotationAgent {
    /// Create an agent over `document`.
    ///
    /// The conversion rate comes from `settings` (the one value the server
    /// injects at page load), falling back to the built-in default.
    pub fn new(
        document: Rc<Document>,
        config: Rc<PricingConfig>,
        settings: &ClientSettings,
        formatter: Rc<dyn CurrencyFormatter>,
    ) -> Self {
        let parser = PriceTextParser::new(
            &config.primary_symbol,
            &config.primary_currency,
            &config.secondary_marker,
        );
        Self {
            converter: Converter::new(settings.resolve_rate()),
            formatter,
            parser,
            document,
            config,
            state: AgentState::Waiting,
            now: 0,
            watch_started: 0,
            queue: BinaryHeap::new(),
            seq: 0,
            debounce_generation: 0,
            debounce_pending: false,
            observed: HashSet::new(),
            checkout_root: None,
            bootstrap_remaining: 0,
            scans_completed: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now
    }

    /// Number of full scans executed so far.
    pub fn scans_completed(&self) -> u64 {
        self.scans_completed
    }

    /// The checkout root element, once discovered.
    ///
    /// Hosts use this to wire the checkout-changed event listener to
    /// [`Self::notify_checkout_changed`].
    pub fn checkout_root(&self) -> Option<NodeRef> {
        self.checkout_root.clone()
    }

    /// Begin watching for the checkout root.
    pub fn start(&mut self) {
        self.state = AgentState::Waiting;
        self.watch_started = self.now;
        let interval = self.config.timings.poll_interval_ms.max(1);
        self.schedule(interval, Task::PollRoot);
        debug!("annotation agent started; polling for <{}>", self.config.selectors.checkout_root);
    }

    /// Advance the virtual clock, firing every timer due up to `at_ms`.
    pub fn advance_to(&mut self, at_ms: u64) {
        while let Some(Reverse(next)) = self.queue.peek().copied() {
            if next.due > at_ms {
                break;
            }
            self.queue.pop();
            self.now = self.now.max(next.due);
            self.run_task(next.task);
        }
        self.now = self.now.max(at_ms);
    }

    /// Advance the virtual clock by `ms`.
    pub fn advance_by(&mut self, ms: u64) {
        self.advance_to(self.now + ms);
    }

    /// Mutation-observer callback: a change happened at `target`.
    ///
    /// Only mutations under an observed root (the checkout root or a
    /// discovered shadow root) schedule a re-scan; shadow boundaries block
    /// observation the same way they block queries.
    pub fn notify_mutation(&mut self, target: &NodeRef) {
        if !matches!(self.state, AgentState::Bootstrapping | AgentState::Observing) {
            return;
        }
        if self.is_observed(target) {
            self.schedule_debounced(self.config.timings.mutation_debounce_ms);
        }
    }

    /// Generic user interaction (click): opportunistically re-scan.
    pub fn notify_click(&mut self) {
        if matches!(self.state, AgentState::Bootstrapping | AgentState::Observing) {
            self.schedule_debounced(self.config.timings.interaction_debounce_ms);
        }
    }

    /// The checkout-changed custom event fired: re-scan.
    pub fn notify_checkout_changed(&mut self) {
        if matches!(self.state, AgentState::Bootstrapping | AgentState::Observing) {
            self.schedule_debounced(self.config.timings.interaction_debounce_ms);
        }
    }

    fn schedule(&mut self, delay_ms: u64, task: Task) {
        self.seq += 1;
        self.queue.push(Reverse(Scheduled { due: self.now + delay_ms, seq: self.seq, task }));
    }

    // A fresh debounce timer replaces any pending one: stale generations are
    // ignored when they fire.
    fn schedule_debounced(&mut self, delay_ms: u64) {
        self.debounce_generation += 1;
        self.debounce_pending = true;
        self.schedule(delay_ms, Task::DebouncedScan(self.debounce_generation));
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::PollRoot => self.poll_root(),
            Task::Rescan => {
                self.process_all_prices();
                if self.state == AgentState::Bootstrapping {
                    self.bootstrap_remaining = self.bootstrap_remaining.saturating_sub(1);
                    if self.bootstrap_remaining == 0 {
                        self.state = AgentState::Observing;
                        debug!("bootstrap re-scans done; observing");
                    }
                }
            }
            Task::ShadowDiscovery => self.discover_shadow_roots(),
            Task::DebouncedScan(generation) => {
                if generation == self.debounce_generation && self.debounce_pending {
                    self.debounce_pending = false;
                    self.process_all_prices();
                }
            }
        }
    }

    fn poll_root(&mut self) {
        if self.state != AgentState::Waiting {
            return;
        }
        let root_selector = Selector::Tag(self.config.selectors.checkout_root.clone());
        if let Some(root) = dom::query_first(&self.document.root(), &root_selector) {
            self.observed.insert(root.borrow().id);
            self.checkout_root = Some(root);
            self.state = AgentState::Bootstrapping;
            let scans = self.config.timings.bootstrap_scans_ms.clone();
            self.bootstrap_remaining = scans.len();
            for delay in scans {
                self.schedule(delay, Task::Rescan);
            }
            for delay in self.config.timings.discovery_passes_ms.clone() {
                self.schedule(delay, Task::ShadowDiscovery);
            }
            debug!("checkout root found at {}ms; bootstrapping", self.now);
            if self.bootstrap_remaining == 0 {
                self.state = AgentState::Observing;
            }
            return;
        }
        let interval = self.config.timings.poll_interval_ms.max(1);
        if self.now + interval <= self.watch_started + self.config.timings.poll_budget_ms {
            self.schedule(interval, Task::PollRoot);
        } else {
            self.state = AgentState::TerminatedWatch;
            debug!("{}; polling stopped", SkipReason::BootstrapTimeout);
        }
    }

    // Walk all known shadow-hosting element types and observe every
    // newly-available shadow root. Roots are not observable until the owning
    // element upgrades, hence the repeated delayed passes.
    fn discover_shadow_roots(&mut self) {
        let host_tags = [
            self.config.selectors.line_items.clone(),
            self.config.selectors.line_item_total.clone(),
            self.config.selectors.order_summary.clone(),
        ];
        for tag in host_tags {
            for host in dom::query_all(&self.document.root(), &Selector::Tag(tag.clone())) {
                if let Some(shadow) = dom::shadow_root(&host) {
                    let id = shadow.borrow().id;
                    if self.observed.insert(id) {
                        trace!("observing shadow root of <{}>", tag);
                    }
                }
            }
        }
    }

    fn is_observed(&self, target: &NodeRef) -> bool {
        let mut cursor = target.clone();
        loop {
            if self.observed.contains(&cursor.borrow().id) {
                return true;
            }
            // An unobserved shadow root hides its subtree from observers
            // attached further out.
            if dom::tag_name(&cursor).as_deref() == Some(SHADOW_ROOT_TAG) {
                return false;
            }
            let parent = cursor.borrow().parent.as_ref().and_then(std::rc::Weak::upgrade);
            match parent {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// One full scan, in fixed order. Re-entrant-safe: every insertion point
    /// checks the marker class first, so a scan with nothing to do writes
    /// nothing.
    fn process_all_prices(&mut self) {
        self.scans_completed += 1;
        trace!("price scan #{}", self.scans_completed);
        self.process_flat_totals();
        self.process_line_item_prices();
        self.process_line_item_totals();
        self.process_order_summary();
    }

    // Flat totals: no shadow tree, text is directly accessible.
    fn process_flat_totals(&self) {
        let selector = Selector::Tag(self.config.selectors.flat_total.clone());
        for element in dom::query_all(&self.document.root(), &selector) {
            self.append_secondary(&element);
        }
    }

    // Line-item prices, one shadow level deep: locate the price by whichever
    // capability the item exposes, then annotate its containing element.
    fn process_line_item_prices(&self) {
        let selectors = &self.config.selectors;
        let capability = Selector::Any(vec![
            Selector::AttrValue("part".to_string(), selectors.price_part.clone()),
            Selector::Class(selectors.price_amount_class.clone()),
            Selector::NamedSlot(selectors.price_slot.clone()),
        ]);
        let list_selector = Selector::Tag(selectors.line_items.clone());
        let item_selector = Selector::Tag(selectors.product_line_item.clone());
        for list in dom::query_all(&self.document.root(), &list_selector) {
            let Some(shadow) = dom::shadow_root(&list) else { continue };
            for item in dom::query_all(&shadow, &item_selector) {
                let Some(item_shadow) = dom::shadow_root(&item) else { continue };
                let Some(price_el) = dom::query_first(&item_shadow, &capability) else {
                    trace!("line item without price slot: {}", SkipReason::StructuralMismatch);
                    continue;
                };
                let container = dom::closest_by_class(&price_el, &selectors.price_container_class)
                    .or_else(|| dom::parent_element(&price_el));
                if let Some(container) = container {
                    self.append_secondary(&container);
                }
            }
        }
    }

    // Line-item totals, two shadow levels deep, with the price content
    // distributed into a named slot: annotate the rendered nodes assigned to
    // the slot, not the slot element itself.
    fn process_line_item_totals(&self) {
        let selectors = &self.config.selectors;
        let total_selector = Selector::Tag(selectors.line_item_total.clone());
        let item_selector = Selector::Tag(selectors.line_item.clone());
        let slot_selector = Selector::NamedSlot(selectors.price_slot.clone());
        let flat_total = Selector::Tag(selectors.flat_total.clone());
        for total_host in dom::query_all(&self.document.root(), &total_selector) {
            let Some(shadow) = dom::shadow_root(&total_host) else { continue };
            for item in dom::query_all(&shadow, &item_selector) {
                let Some(item_shadow) = dom::shadow_root(&item) else { continue };
                let Some(slot) = dom::query_first(&item_shadow, &slot_selector) else { continue };
                for node in dom::assigned_nodes(&slot) {
                    if !matches!(node.borrow().kind, NodeKind::Element(_)) {
                        continue;
                    }
                    if let Some(total) = dom::query_first(&node, &flat_total) {
                        self.append_secondary(&total);
                    } else {
                        let text = dom::text_content(&node);
                        if text.contains(&self.config.primary_symbol)
                            && !text.contains(&self.config.secondary_marker)
                        {
                            self.append_secondary(&node);
                        }
                    }
                }
            }
        }
    }

    // Order summary: every descendant with a price-like role, skipping
    // anything without a recognizable primary-currency substring.
    fn process_order_summary(&self) {
        let selectors = &self.config.selectors;
        let summary_selector = Selector::Tag(selectors.order_summary.clone());
        let price_like = Selector::Any(vec![
            Selector::AttrValue("slot".to_string(), selectors.price_slot.clone()),
            Selector::Class(selectors.price_container_class.clone()),
            Selector::Tag(selectors.format_number.clone()),
        ]);
        for summary in dom::query_all(&self.document.root(), &summary_selector) {
            let Some(shadow) = dom::shadow_root(&summary) else { continue };
            for element in dom::query_all(&shadow, &price_like) {
                let text = dom::text_content(&element);
                if !text.contains(&self.config.primary_symbol) {
                    continue;
                }
                self.append_secondary(&element);
            }
        }
    }

    // The one DOM write the agent ever performs: append a marker-classed span
    // with the formatted secondary value. Checked against the marker class,
    // the marker substring, parseability, and a positive amount, in that
    // order, so it can run any number of times.
    fn append_secondary(&self, element: &NodeRef) {
        let marker = Selector::Class(self.config.marker_class.clone());
        if dom::query_first(element, &marker).is_some() {
            return;
        }
        let text = dom::text_content(element);
        if text.contains(&self.config.secondary_marker) {
            trace!("text already carries the secondary marker");
            return;
        }
        let Some(minor_units) = self.parser.parse(&text) else {
            trace!("{}: {:?}", SkipReason::ParseFailure, text);
            return;
        };
        let Some(secondary) = self.converter.secondary_display(minor_units, self.formatter.as_ref())
        else {
            trace!("{}", SkipReason::NotApplicable);
            return;
        };
        let span = self.document.create_element("span");
        dom::set_attribute(&span, "class", &self.config.marker_class);
        dom::append_child(&span, &self.document.create_text(&format!(" ({})", secondary)));
        dom::append_child(element, &span);
    }
}
