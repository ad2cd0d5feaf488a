//! Static map from actor type to component types, and component type to
//! its feature binding. A language without runtime reflection can't scan
//! loaded plugins for annotated classes (spec §9), so this is an explicit
//! registration table: each plugin calls `register(...)` at load time
//! instead of the registry discovering bindings itself.
//!
//! The spec's `agentType -> componentType` binding (resolved elsewhere via
//! an agent's declared state generic) collapses here into a single
//! `componentType -> AgentFactory` slot held directly by
//! [`crate::component::Component`]: there is exactly one agent factory
//! per component type, so a separate agent-type indirection has nothing
//! left to index.

use crate::error::RegistrationError;
use crate::id::ActorType;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct ComponentRegistryBuilder {
    actor_to_components: HashMap<ActorType, HashSet<&'static str>>,
    component_to_actor: HashMap<&'static str, ActorType>,
    feature_to_components: HashMap<&'static str, HashSet<&'static str>>,
    component_to_feature: HashMap<&'static str, &'static str>,
    agent_bound: HashSet<&'static str>,
}

impl ComponentRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `component_type` to `actor_type`, and optionally to a
    /// `feature_id` (role components only, per spec §4.5).
    pub fn register(
        &mut self,
        actor_type: ActorType,
        component_type: &'static str,
        feature_id: Option<&'static str>,
    ) -> &mut Self {
        self.actor_to_components
            .entry(actor_type)
            .or_default()
            .insert(component_type);
        self.component_to_actor.insert(component_type, actor_type);
        if let Some(feature) = feature_id {
            self.feature_to_components
                .entry(feature)
                .or_default()
                .insert(component_type);
            self.component_to_feature.insert(component_type, feature);
        }
        self
    }

    /// Declares that `component_type` has a concrete agent factory. Any
    /// component type registered via [`Self::register`] but never bound
    /// here fails `build()`.
    pub fn bind_agent(&mut self, component_type: &'static str) -> &mut Self {
        self.agent_bound.insert(component_type);
        self
    }

    pub fn build(self) -> Result<ComponentRegistry, RegistrationError> {
        for component_type in self.component_to_actor.keys() {
            if !self.agent_bound.contains(component_type) {
                return Err(RegistrationError::MissingAgent { component_type });
            }
        }
        Ok(ComponentRegistry {
            actor_to_components: self.actor_to_components,
            component_to_actor: self.component_to_actor,
            feature_to_components: self.feature_to_components,
            component_to_feature: self.component_to_feature,
        })
    }
}

/// Built once at startup (or rebuilt whole on hotfix reload, per the
/// hotfix/plugin loader's contract; the registry itself never mutates in
/// place).
pub struct ComponentRegistry {
    actor_to_components: HashMap<ActorType, HashSet<&'static str>>,
    component_to_actor: HashMap<&'static str, ActorType>,
    feature_to_components: HashMap<&'static str, HashSet<&'static str>>,
    component_to_feature: HashMap<&'static str, &'static str>,
}

impl ComponentRegistry {
    pub fn components_for_actor_type(&self, actor_type: ActorType) -> Option<&HashSet<&'static str>> {
        self.actor_to_components.get(&actor_type)
    }

    pub fn actor_type_of(&self, component_type: &str) -> Option<ActorType> {
        self.component_to_actor.get(component_type).copied()
    }

    pub fn components_for_feature(&self, feature_id: &str) -> Option<&HashSet<&'static str>> {
        self.feature_to_components.get(feature_id)
    }

    pub fn feature_of(&self, component_type: &str) -> Option<&'static str> {
        self.component_to_feature.get(component_type).copied()
    }

    /// `newComponent`'s precondition: asserts `component_type` is
    /// registered to `actor_type` before a component of that type is
    /// instantiated for an actor of that type.
    pub fn assert_registered(
        &self,
        actor_type: ActorType,
        component_type: &'static str,
    ) -> Result<(), RegistrationError> {
        match self.component_to_actor.get(component_type) {
            Some(&bound_type) if bound_type == actor_type => Ok(()),
            Some(_) => Err(RegistrationError::NotRegisteredToType {
                component_type,
                actor_type,
            }),
            None => Err(RegistrationError::UnboundComponent { component_type }),
        }
    }
}
