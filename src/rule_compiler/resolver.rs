// Component Resolver
//
// Binds every name in an expression to what it refers to: calling-function
// arguments by declared position, trackers and foreign calls through the
// lookup tables, global variables by their fixed names. Bare identifiers
// that are not arguments become text literals.
//
// Components are catalogued in a fixed order: arguments (declared order,
// only those used), then foreign calls, then trackers, then globals, each
// group in order of first appearance.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::rule_compiler::ast::{Expr, GlobalVariable, Reference, TrackerRef};
use crate::rule_compiler::config::UnresolvedSymbolPolicy;
use crate::rule_compiler::error::{CompilerError, SymbolKind};
use crate::rule_compiler::types::{CallingFunction, PType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSymbol {
    pub index: u64,
    pub p_type: PType,
    /// Present for mapped trackers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<PType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignCallSymbol {
    pub index: u64,
    pub return_type: PType,
}

/// Name to index tables supplied by the on-chain side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolTables {
    #[serde(default)]
    pub trackers: IndexMap<String, TrackerSymbol>,
    #[serde(default)]
    pub foreign_calls: IndexMap<String, ForeignCallSymbol>,
}

impl SymbolTables {
    pub fn new() -> Self {
        SymbolTables::default()
    }

    pub fn add_tracker(&mut self, name: impl Into<String>, index: u64, p_type: PType) -> &mut Self {
        self.trackers.insert(
            name.into(),
            TrackerSymbol {
                index,
                p_type,
                key_type: None,
            },
        );
        self
    }

    pub fn add_mapped_tracker(
        &mut self,
        name: impl Into<String>,
        index: u64,
        key_type: PType,
        p_type: PType,
    ) -> &mut Self {
        self.trackers.insert(
            name.into(),
            TrackerSymbol {
                index,
                p_type,
                key_type: Some(key_type),
            },
        );
        self
    }

    pub fn add_foreign_call(
        &mut self,
        name: impl Into<String>,
        index: u64,
        return_type: PType,
    ) -> &mut Self {
        self.foreign_calls.insert(
            name.into(),
            ForeignCallSymbol { index, return_type },
        );
        self
    }

    /// Tracker index to name, as the decompiler needs it
    pub fn tracker_names(&self) -> IndexMap<u64, String> {
        self.trackers
            .iter()
            .map(|(name, symbol)| (symbol.index, name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentSource {
    Argument,
    ForeignCall,
    Tracker,
    Global(GlobalVariable),
}

/// A resolved reference inside a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleComponent {
    /// Display name: the argument name, `TR:name`, `FC:name` or `GV:NAME`
    pub name: String,
    pub type_specific_index: u64,
    pub raw_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_type_two: Option<String>,
    /// Canonical call text of a foreign call, e.g. `FC:leaderboard(to)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_call_placeholder: Option<String>,
    pub source: ComponentSource,
    pub p_type: PType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<PType>,
}

impl RuleComponent {
    /// Name shown for this component's placeholder when decompiling
    pub fn display_name(&self) -> &str {
        self.foreign_call_placeholder.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKey {
    Argument(String),
    ForeignCall(String),
    Tracker(String),
    Global(GlobalVariable),
}

impl ComponentKey {
    pub fn of(reference: &Reference) -> ComponentKey {
        match reference {
            Reference::Argument(name) => ComponentKey::Argument(name.clone()),
            Reference::Tracker(tracker) => ComponentKey::Tracker(tracker.name.clone()),
            Reference::ForeignCall { name, .. } => ComponentKey::ForeignCall(name.clone()),
            Reference::Global(global) => ComponentKey::Global(*global),
        }
    }
}

/// Components of one rule side, deduplicated and in resolution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentCatalog {
    components: IndexMap<ComponentKey, RuleComponent>,
}

impl ComponentCatalog {
    pub fn get(&self, key: &ComponentKey) -> Option<&RuleComponent> {
        self.components.get(key)
    }

    pub fn lookup(&self, reference: &Reference) -> Option<&RuleComponent> {
        self.get(&ComponentKey::of(reference))
    }

    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.components.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleComponent> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// First registration wins
    fn insert(&mut self, key: ComponentKey, component: RuleComponent) {
        if !self.components.contains_key(&key) {
            log::debug!(
                "Resolved component '{}' -> index {}",
                component.name,
                component.type_specific_index
            );
            self.components.insert(key, component);
        }
    }
}

pub struct Resolver<'a> {
    function: &'a CallingFunction,
    tables: &'a SymbolTables,
    policy: UnresolvedSymbolPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(
        function: &'a CallingFunction,
        tables: &'a SymbolTables,
        policy: UnresolvedSymbolPolicy,
    ) -> Self {
        Resolver {
            function,
            tables,
            policy,
        }
    }

    /// Resolve one expression into a fresh catalog
    pub fn resolve(&self, expr: Expr) -> Result<(Expr, ComponentCatalog), CompilerError> {
        let mut catalog = ComponentCatalog::default();
        let expr = self.resolve_into(expr, &mut catalog)?;
        Ok((expr, catalog))
    }

    /// Resolve an expression, adding its components to a shared catalog
    pub fn resolve_into(
        &self,
        expr: Expr,
        catalog: &mut ComponentCatalog,
    ) -> Result<Expr, CompilerError> {
        let expr = self.bind_identifiers(expr);

        let mut arguments = IndexSet::new();
        let mut foreign_calls: Vec<&Reference> = Vec::new();
        let mut trackers: Vec<(&TrackerRef, bool)> = Vec::new();
        let mut globals = IndexSet::new();

        walk(&expr, &mut |node| match node {
            Expr::Reference(reference @ Reference::ForeignCall { .. }) => {
                foreign_calls.push(reference)
            }
            Expr::Reference(Reference::Argument(name)) => {
                arguments.insert(name.as_str());
            }
            Expr::Reference(Reference::Tracker(tracker)) => trackers.push((tracker, false)),
            Expr::Reference(Reference::Global(global)) => {
                globals.insert(*global);
            }
            Expr::Mapped { tracker, .. } => trackers.push((tracker, true)),
            _ => {}
        });

        for (index, argument) in self.function.arguments.iter().enumerate() {
            if arguments.contains(argument.name.as_str()) {
                catalog.insert(
                    ComponentKey::Argument(argument.name.clone()),
                    RuleComponent {
                        name: argument.name.clone(),
                        type_specific_index: index as u64,
                        raw_type: argument.raw_type.clone(),
                        raw_type_two: None,
                        foreign_call_placeholder: None,
                        source: ComponentSource::Argument,
                        p_type: argument.p_type,
                        key_type: None,
                    },
                );
            }
        }

        for reference in foreign_calls {
            if let Reference::ForeignCall { name, .. } = reference {
                let key = ComponentKey::ForeignCall(name.clone());
                if !catalog.contains(&key) {
                    let component = self.foreign_call_component(name, reference.to_string())?;
                    catalog.insert(key, component);
                }
            }
        }

        for (tracker, mapped) in trackers {
            let key = ComponentKey::Tracker(tracker.name.clone());
            if !catalog.contains(&key) {
                let component = self.tracker_component(tracker, mapped)?;
                catalog.insert(key, component);
            }
        }

        for global in globals {
            catalog.insert(
                ComponentKey::Global(global),
                RuleComponent {
                    name: format!("GV:{}", global.name()),
                    type_specific_index: 0,
                    raw_type: "global".to_string(),
                    raw_type_two: Some(global.p_type().to_string()),
                    foreign_call_placeholder: None,
                    source: ComponentSource::Global(global),
                    p_type: global.p_type(),
                    key_type: None,
                },
            );
        }

        Ok(expr)
    }

    /// Identifiers naming a calling-function argument become argument
    /// references; every other bare word is a text literal.
    fn bind_identifiers(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Identifier(name) => {
                if self.function.position_of(&name).is_some() {
                    Expr::Reference(Reference::Argument(name))
                } else {
                    Expr::Text(name)
                }
            }
            Expr::Reference(Reference::ForeignCall { name, arguments }) => {
                Expr::Reference(Reference::ForeignCall {
                    name,
                    arguments: arguments
                        .into_iter()
                        .map(|arg| self.bind_identifiers(arg))
                        .collect(),
                })
            }
            Expr::Mapped { tracker, key } => Expr::Mapped {
                tracker,
                key: Box::new(self.bind_identifiers(*key)),
            },
            Expr::Binary {
                left,
                operator,
                right,
            } => Expr::Binary {
                left: Box::new(self.bind_identifiers(*left)),
                operator,
                right: Box::new(self.bind_identifiers(*right)),
            },
            Expr::Unary { operator, operand } => Expr::Unary {
                operator,
                operand: Box::new(self.bind_identifiers(*operand)),
            },
            other => other,
        }
    }

    fn foreign_call_component(
        &self,
        name: &str,
        call_text: String,
    ) -> Result<RuleComponent, CompilerError> {
        let (index, return_type) = match self.tables.foreign_calls.get(name) {
            Some(symbol) => (symbol.index, symbol.return_type),
            None => {
                self.unresolved(format!("FC:{}", name), SymbolKind::ForeignCall)?;
                (0, PType::Uint256)
            }
        };

        Ok(RuleComponent {
            name: format!("FC:{}", name),
            type_specific_index: index,
            raw_type: "foreign call".to_string(),
            raw_type_two: Some(return_type.to_string()),
            foreign_call_placeholder: Some(call_text),
            source: ComponentSource::ForeignCall,
            p_type: return_type,
            key_type: None,
        })
    }

    fn tracker_component(
        &self,
        tracker: &TrackerRef,
        mapped: bool,
    ) -> Result<RuleComponent, CompilerError> {
        let (index, p_type, key_type) = match self.tables.trackers.get(&tracker.name) {
            Some(symbol) => (symbol.index, symbol.p_type, symbol.key_type),
            None => {
                self.unresolved(format!("TR:{}", tracker.name), SymbolKind::Tracker)?;
                (0, PType::Uint256, mapped.then_some(PType::Uint256))
            }
        };

        Ok(RuleComponent {
            name: format!("TR:{}", tracker.name),
            type_specific_index: index,
            raw_type: "tracker".to_string(),
            raw_type_two: Some(p_type.to_string()),
            foreign_call_placeholder: None,
            source: ComponentSource::Tracker,
            p_type,
            key_type,
        })
    }

    fn unresolved(&self, name: String, kind: SymbolKind) -> Result<(), CompilerError> {
        match self.policy {
            UnresolvedSymbolPolicy::Error => Err(CompilerError::UnresolvedSymbol(name, kind)),
            UnresolvedSymbolPolicy::IndexZero => {
                log::warn!("Unresolved {} '{}' falls back to index 0", kind, name);
                Ok(())
            }
        }
    }
}

/// Pre-order, left to right
fn walk<'e>(expr: &'e Expr, visit: &mut dyn FnMut(&'e Expr)) {
    visit(expr);
    match expr {
        Expr::Reference(Reference::ForeignCall { arguments, .. }) => {
            for argument in arguments {
                walk(argument, visit);
            }
        }
        Expr::Mapped { key, .. } => walk(key, visit),
        Expr::Binary { left, right, .. } => {
            walk(left, visit);
            walk(right, visit);
        }
        Expr::Unary { operand, .. } => walk(operand, visit),
        _ => {}
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
