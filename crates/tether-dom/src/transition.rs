#![forbid(unsafe_code)]

//! Enter/leave transitions around DOM attachment.
//!
//! A [`TransitionRunner`] receives the element, a [`Direction`], and a
//! completion that performs the actual mutation. It decides when the
//! completion runs and reports the path it took as a [`TransitionCode`].
//!
//! The default [`EffectRunner`] picks the effect in this order:
//!
//! | Source | Effect |
//! |--------|--------|
//! | context is compiling | none, [`TransitionCode::Init`] |
//! | explicit effect on the context | that effect |
//! | `<prefix>-effect="id"` attribute | registered JS hooks for `id` |
//! | `<prefix>-transition` attribute | CSS classes (configured, or `<name>-enter`/`<name>-leave`) |
//! | otherwise | none, [`TransitionCode::Skip`] |
//!
//! # Failure Modes
//!
//! - A completion that runs synchronously returns its error to the caller.
//! - A completion deferred to a scheduler tick reports its error as a task
//!   failure in that tick's report.
//! - Entering an element whose CSS leave is still pending cancels the leave;
//!   the leave's completion never runs.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tether_core::{Config, Scheduler};

use crate::document::{Document, NodeId};
use crate::error::DomError;

/// Continuation that performs the DOM mutation.
pub type Completion = Box<dyn FnOnce() -> Result<(), DomError>>;

/// Whether the element is being inserted or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enter,
    Leave,
}

/// Which path a transition took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCode {
    /// Enter class applied; completion ran immediately.
    CssEnter,
    /// Leave class applied; completion deferred to the next tick.
    CssLeave,
    /// CSS leave on a detached element; completion ran immediately.
    CssSkip,
    /// JS enter hook invoked.
    JsEnter,
    /// JS leave hook invoked.
    JsLeave,
    /// Effect id not registered; completion ran immediately.
    JsSkip,
    /// Effect has no enter hook; completion ran immediately.
    JsSkipEnter,
    /// Effect has no leave hook; completion ran immediately.
    JsSkipLeave,
    /// The owner was still compiling; completion ran immediately.
    Init,
    /// No effect; completion ran immediately.
    Skip,
}

/// Handle passed to JS hooks. Finishing it runs the completion.
pub struct Done {
    completion: Completion,
}

impl Done {
    /// Run the pending DOM mutation.
    pub fn finish(self) -> Result<(), DomError> {
        (self.completion)()
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

/// JS transition hook.
pub type JsHook = Rc<dyn Fn(NodeId, Done)>;

/// Pair of optional JS hooks.
#[derive(Clone, Default)]
pub struct JsEffect {
    enter: Option<JsHook>,
    leave: Option<JsHook>,
}

impl JsEffect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_enter(mut self, hook: impl Fn(NodeId, Done) + 'static) -> Self {
        self.enter = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_leave(mut self, hook: impl Fn(NodeId, Done) + 'static) -> Self {
        self.leave = Some(Rc::new(hook));
        self
    }

    fn hook(&self, direction: Direction) -> Option<&JsHook> {
        match direction {
            Direction::Enter => self.enter.as_ref(),
            Direction::Leave => self.leave.as_ref(),
        }
    }
}

impl std::fmt::Debug for JsEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsEffect")
            .field("enter", &self.enter.is_some())
            .field("leave", &self.leave.is_some())
            .finish()
    }
}

/// Named JS effects looked up through the `<prefix>-effect` attribute.
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    effects: AHashMap<String, JsEffect>,
}

impl EffectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, id: impl Into<String>, effect: JsEffect) -> Self {
        self.effects.insert(id.into(), effect);
        self
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&JsEffect> {
        self.effects.get(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// The effect applied to one transition.
#[derive(Debug, Clone, Default)]
pub enum TransitionEffect {
    #[default]
    None,
    Css {
        enter_class: String,
        leave_class: String,
    },
    Js(JsEffect),
    /// An effect id that is not registered.
    MissingJs(String),
}

impl TransitionEffect {
    /// CSS effect using `<name>-enter` / `<name>-leave`.
    #[must_use]
    pub fn css(name: &str) -> Self {
        Self::Css {
            enter_class: format!("{name}-enter"),
            leave_class: format!("{name}-leave"),
        }
    }
}

/// Everything a runner may consult for one transition.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub document: Document,
    pub scheduler: Scheduler,
    pub config: Rc<Config>,
    pub effects: Rc<EffectRegistry>,
    /// Effect that overrides the element's attributes.
    pub effect: Option<TransitionEffect>,
    /// Whether the owning instance is still being built.
    pub compiling: bool,
}

impl TransitionContext {
    #[must_use]
    pub fn new(document: Document, scheduler: Scheduler, config: Rc<Config>) -> Self {
        Self {
            document,
            scheduler,
            config,
            effects: Rc::new(EffectRegistry::new()),
            effect: None,
            compiling: false,
        }
    }

    /// Effect for `node`, from the explicit override or its attributes.
    #[must_use]
    pub fn resolve_effect(&self, node: NodeId) -> TransitionEffect {
        if let Some(effect) = &self.effect {
            return effect.clone();
        }
        let doc = &self.document;
        if let Some(id) = doc.get_attribute(node, &self.config.attribute("effect")) {
            return match self.effects.get(&id) {
                Some(effect) => TransitionEffect::Js(effect.clone()),
                None => TransitionEffect::MissingJs(id),
            };
        }
        match doc.get_attribute(node, &self.config.attribute("transition")) {
            Some(name) if name.is_empty() => TransitionEffect::Css {
                enter_class: self.config.enter_class.clone(),
                leave_class: self.config.leave_class.clone(),
            },
            Some(name) => TransitionEffect::css(&name),
            None => TransitionEffect::None,
        }
    }
}

/// Strategy that decides when a DOM mutation completes.
pub trait TransitionRunner {
    fn run(
        &self,
        node: NodeId,
        direction: Direction,
        completion: Completion,
        ctx: &TransitionContext,
    ) -> Result<TransitionCode, DomError>;
}

/// Default runner for CSS-class and JS-hook effects.
#[derive(Debug, Default)]
pub struct EffectRunner {
    pending_leaves: Rc<RefCell<AHashMap<NodeId, Rc<Cell<bool>>>>>,
}

impl EffectRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of CSS leaves waiting for their tick.
    #[must_use]
    pub fn pending_leaves(&self) -> usize {
        self.pending_leaves.borrow().len()
    }

    fn run_css(
        &self,
        node: NodeId,
        direction: Direction,
        completion: Completion,
        ctx: &TransitionContext,
        enter_class: String,
        leave_class: String,
    ) -> Result<TransitionCode, DomError> {
        let doc = &ctx.document;
        match direction {
            Direction::Enter => {
                if let Some(cancelled) = self.pending_leaves.borrow_mut().remove(&node) {
                    cancelled.set(true);
                    doc.remove_class(node, &leave_class)?;
                    tracing::debug!(target: "tether::transition", %node, "pending leave cancelled");
                }
                doc.add_class(node, &enter_class)?;
                completion()?;
                let doc = doc.clone();
                ctx.scheduler.next_tick_fallible(move || {
                    doc.remove_class(node, &enter_class)?;
                    Ok(())
                });
                Ok(TransitionCode::CssEnter)
            }
            Direction::Leave => {
                if !doc.is_connected(node) {
                    completion()?;
                    return Ok(TransitionCode::CssSkip);
                }
                doc.add_class(node, &leave_class)?;
                let token = Rc::new(Cell::new(false));
                self.pending_leaves
                    .borrow_mut()
                    .insert(node, Rc::clone(&token));
                let pending = Rc::clone(&self.pending_leaves);
                let doc = doc.clone();
                ctx.scheduler.next_tick_fallible(move || {
                    if token.get() {
                        return Ok(());
                    }
                    pending.borrow_mut().remove(&node);
                    doc.remove_class(node, &leave_class)?;
                    completion()?;
                    Ok(())
                });
                Ok(TransitionCode::CssLeave)
            }
        }
    }
}

impl TransitionRunner for EffectRunner {
    fn run(
        &self,
        node: NodeId,
        direction: Direction,
        completion: Completion,
        ctx: &TransitionContext,
    ) -> Result<TransitionCode, DomError> {
        if ctx.compiling {
            completion()?;
            return Ok(TransitionCode::Init);
        }
        let effect = ctx.resolve_effect(node);
        tracing::trace!(target: "tether::transition", %node, ?direction, ?effect, "run");
        match effect {
            TransitionEffect::None => {
                completion()?;
                Ok(TransitionCode::Skip)
            }
            TransitionEffect::MissingJs(id) => {
                tracing::debug!(target: "tether::transition", %node, id = %id, "effect not registered");
                completion()?;
                Ok(TransitionCode::JsSkip)
            }
            TransitionEffect::Js(effect) => match effect.hook(direction) {
                Some(hook) => {
                    hook(node, Done { completion });
                    Ok(match direction {
                        Direction::Enter => TransitionCode::JsEnter,
                        Direction::Leave => TransitionCode::JsLeave,
                    })
                }
                None => {
                    completion()?;
                    Ok(match direction {
                        Direction::Enter => TransitionCode::JsSkipEnter,
                        Direction::Leave => TransitionCode::JsSkipLeave,
                    })
                }
            },
            TransitionEffect::Css {
                enter_class,
                leave_class,
            } => self.run_css(node, direction, completion, ctx, enter_class, leave_class),
        }
    }
}
