//! Query Compiler - turn a query AST into store query text and a projection
//!
//! Each selected field path becomes exactly one result column. The
//! projection records the paths in column order so the materializer can put
//! every column back where it belongs.
//!
//! Relation segments become left joins. A relation `R` reached from alias
//! `P` joins as `LEFT JOIN R ON R.id = P.RId`; relations below the first
//! level are aliased by their path (`Account_Owner`) so one table can be
//! joined more than once. A path alias that would shadow another join (or
//! the root table) is a compile error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ember_ast::{CompareOp, Condition, FieldPath, NullsOrder, Operand, OrderBy, Query, SortDirection};
use indexmap::IndexMap;
use tracing::debug;

use crate::class::ClassType;
use crate::error::CompileError;
use crate::registry::ClassRegistry;
use crate::sql::{check_identifier, ID_COLUMN};
use crate::value::Value;

/// Values for `:name` bind variables
pub type Bindings = HashMap<String, Value>;

/// Field paths index-aligned with the compiled query's result columns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Projection {
    paths: Vec<FieldPath>,
}

impl Projection {
    pub fn new(paths: Vec<FieldPath>) -> Self {
        Self { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, column: usize) -> Option<&FieldPath> {
        self.paths.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPath> {
        self.paths.iter()
    }
}

/// Output of the compiler: statement text plus how to read its rows
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub projection: Projection,
    /// Class each result row materializes into
    pub class: Arc<ClassType>,
}

#[derive(Debug)]
struct Join {
    table: String,
    alias: String,
    parent_alias: String,
    relation: String,
}

/// Joins collected while resolving field paths, keyed by relation path
#[derive(Debug)]
struct JoinPlan<'r> {
    registry: &'r ClassRegistry,
    root: String,
    joins: IndexMap<String, Join>,
    /// Every name usable as a table qualifier, root included
    aliases: HashSet<String>,
}

impl<'r> JoinPlan<'r> {
    fn new(registry: &'r ClassRegistry, root: &str) -> Self {
        Self {
            registry,
            root: root.to_string(),
            joins: IndexMap::new(),
            aliases: HashSet::from([root.to_string()]),
        }
    }

    /// `alias.column` for `path`, adding any joins it needs
    fn column(&mut self, path: &FieldPath, index: usize) -> Result<String, CompileError> {
        let leaf = match path.leaf() {
            Some(leaf) => check_identifier(leaf)?,
            None => return Err(CompileError::EmptyFieldPath { index }),
        };

        if !path.is_relationship() {
            return Ok(format!("{}.{}", self.root, leaf));
        }

        let mut parent_alias = self.root.clone();
        let relations = path.relations();
        for depth in 0..relations.len() {
            let relation = check_identifier(&relations[depth])?;
            if depth == 0 && relation == self.root {
                return Err(CompileError::SelfRelation {
                    relation: relation.to_string(),
                });
            }
            let key = relations[..=depth].join(".");
            if !self.joins.contains_key(&key) {
                let class = self.registry.resolve_relation(relation, &path.to_string())?;
                let alias = relations[..=depth].join("_");
                if !self.aliases.insert(alias.clone()) {
                    return Err(CompileError::AliasCollision {
                        alias,
                        path: path.to_string(),
                    });
                }
                let join = Join {
                    table: class.name().to_string(),
                    alias,
                    parent_alias: parent_alias.clone(),
                    relation: relation.to_string(),
                };
                self.joins.insert(key.clone(), join);
            }
            parent_alias = self.joins[&key].alias.clone();
        }

        Ok(format!("{}.{}", parent_alias, leaf))
    }

    fn render(&self, out: &mut String) {
        for join in self.joins.values() {
            out.push_str(" LEFT JOIN ");
            out.push_str(&join.table);
            if join.alias != join.table {
                out.push_str(" AS ");
                out.push_str(&join.alias);
            }
            out.push_str(&format!(
                " ON {}.{} = {}.{}Id",
                join.alias, ID_COLUMN, join.parent_alias, join.relation
            ));
        }
    }
}

pub struct QueryCompiler<'r> {
    registry: &'r ClassRegistry,
}

impl<'r> QueryCompiler<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self { registry }
    }

    /// Compile `query`. Nothing is sent to the store; every failure is
    /// reported before a statement exists.
    pub fn compile(&self, query: &Query, bindings: &Bindings) -> Result<CompiledQuery, CompileError> {
        let from = check_identifier(&query.from)?;
        let class = self.registry.resolve(from)?;

        if query.fields.is_empty() {
            return Err(CompileError::EmptySelection {
                class: from.to_string(),
            });
        }

        let mut plan = JoinPlan::new(self.registry, from);
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(query.fields.len());
        for (index, path) in query.fields.iter().enumerate() {
            if path.is_empty() {
                return Err(CompileError::EmptyFieldPath { index });
            }
            if !seen.insert(path) {
                return Err(CompileError::DuplicateField {
                    path: path.to_string(),
                });
            }
            columns.push(plan.column(path, index)?);
        }

        let filter = match &query.filter {
            Some(condition) => {
                let mut referenced = Vec::new();
                condition.for_each_field(&mut |path| referenced.push(path));
                for (index, path) in referenced.into_iter().enumerate() {
                    plan.column(path, index)?;
                }
                Some(self.condition(condition, &mut plan, bindings)?)
            }
            None => None,
        };

        let mut order = Vec::with_capacity(query.order_by.len());
        for (index, item) in query.order_by.iter().enumerate() {
            order.push(self.order_item(item, index, &mut plan)?);
        }

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), from);
        plan.render(&mut sql);
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        match (paging("LIMIT", query.limit)?, paging("OFFSET", query.offset)?) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        debug!(sql = %sql, columns = columns.len(), "compiled query");
        Ok(CompiledQuery {
            sql,
            projection: Projection::new(query.fields.clone()),
            class: Arc::clone(class),
        })
    }

    fn order_item(&self, item: &OrderBy, index: usize, plan: &mut JoinPlan<'_>) -> Result<String, CompileError> {
        let mut out = plan.column(&item.field, index)?;
        out.push_str(match item.direction {
            SortDirection::Asc => " ASC",
            SortDirection::Desc => " DESC",
        });
        match item.nulls {
            Some(NullsOrder::First) => out.push_str(" NULLS FIRST"),
            Some(NullsOrder::Last) => out.push_str(" NULLS LAST"),
            None => {}
        }
        Ok(out)
    }

    fn condition(
        &self,
        condition: &Condition,
        plan: &mut JoinPlan<'_>,
        bindings: &Bindings,
    ) -> Result<String, CompileError> {
        match condition {
            Condition::Compare { field, op, operand } => {
                let column = plan.column(field, 0)?;
                let value = resolve_operand(operand, bindings)?;
                comparison(&column, *op, &value)
            }
            Condition::And(items) => self.junction(items, " AND ", "1", plan, bindings),
            Condition::Or(items) => self.junction(items, " OR ", "0", plan, bindings),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.condition(inner, plan, bindings)?)),
        }
    }

    fn junction(
        &self,
        items: &[Condition],
        separator: &str,
        empty: &str,
        plan: &mut JoinPlan<'_>,
        bindings: &Bindings,
    ) -> Result<String, CompileError> {
        if items.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = items
            .iter()
            .map(|item| self.condition(item, plan, bindings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({})", parts.join(separator)))
    }
}

/// The store reads LIMIT and OFFSET as signed 64-bit integers
fn paging(clause: &str, value: Option<u64>) -> Result<Option<i64>, CompileError> {
    value
        .map(|v| {
            i64::try_from(v).map_err(|_| CompileError::PagingOutOfRange {
                clause: clause.to_string(),
                value: v,
            })
        })
        .transpose()
}

fn resolve_operand(operand: &Operand, bindings: &Bindings) -> Result<Value, CompileError> {
    match operand {
        Operand::Literal(literal) => Ok(Value::from_literal(literal)),
        Operand::List(items) => Ok(Value::List(items.iter().map(Value::from_literal).collect())),
        Operand::Bind(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::UnboundVariable { name: name.clone() }),
    }
}

fn comparison(column: &str, op: CompareOp, value: &Value) -> Result<String, CompileError> {
    let invalid = |reason: &str| CompileError::InvalidOperand {
        op: op.as_sql().to_string(),
        reason: reason.to_string(),
    };

    match (op, value) {
        (CompareOp::In | CompareOp::NotIn, Value::List(items)) => {
            if items.is_empty() {
                // Empty IN matches nothing, empty NOT IN matches everything
                return Ok(if op == CompareOp::In { "0" } else { "1" }.to_string());
            }
            Ok(format!("{} {} {}", column, op.as_sql(), value.to_sql_literal()?))
        }
        (CompareOp::In | CompareOp::NotIn, _) => Err(invalid("a single value")),
        (_, Value::List(_)) => Err(invalid("a list")),
        (CompareOp::Eq, Value::Null) => Ok(format!("{} IS NULL", column)),
        (CompareOp::Ne, Value::Null) => Ok(format!("{} IS NOT NULL", column)),
        (_, Value::Null) => Err(invalid("null")),
        _ => Ok(format!("{} {} {}", column, op.as_sql(), value.to_sql_literal()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use ember_ast::Literal;

    fn registry() -> Arc<ClassRegistry> {
        let mut builder = RegistryBuilder::new();
        for name in ["Account", "Contact", "User"] {
            builder.register_class(ClassType::new(name)).unwrap();
        }
        builder.build()
    }

    fn compile(query: &Query) -> Result<CompiledQuery, CompileError> {
        let registry = registry();
        QueryCompiler::new(&registry).compile(query, &Bindings::new())
    }

    #[test]
    fn test_plain_fields() {
        let compiled = compile(&Query::select("Account", ["Id", "Name"])).unwrap();
        assert_eq!(compiled.sql, "SELECT Account.Id, Account.Name FROM Account");
        assert_eq!(compiled.projection.len(), 2);
        assert_eq!(compiled.class.name(), "Account");
    }

    #[test]
    fn test_relation_field_joins_once() {
        let compiled =
            compile(&Query::select("Contact", ["LastName", "Account.Name", "Account.Id"])).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT Contact.LastName, Account.Name, Account.Id FROM Contact \
             LEFT JOIN Account ON Account.id = Contact.AccountId"
        );
        assert_eq!(compiled.projection.len(), 3);
        assert_eq!(compiled.projection.get(1), Some(&FieldPath::parse("Account.Name")));
    }

    #[test]
    fn test_multi_level_relation_is_aliased() {
        let compiled = compile(&Query::select("Contact", ["Account.User.Name"])).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT Account_User.Name FROM Contact \
             LEFT JOIN Account ON Account.id = Contact.AccountId \
             LEFT JOIN User AS Account_User ON Account_User.id = Account.UserId"
        );
    }

    #[test]
    fn test_filter_order_and_paging() {
        let query = Query::select("Contact", ["LastName"])
            .filter(Condition::And(vec![
                Condition::eq("Account.Name", Literal::String("O'Brien".into())),
                Condition::compare("FirstName", CompareOp::Ne, Operand::Literal(Literal::Null)),
                Condition::compare(
                    "LastName",
                    CompareOp::In,
                    Operand::List(vec![Literal::String("l1".into()), Literal::String("l2".into())]),
                ),
            ]))
            .order_by(OrderBy {
                field: "LastName".into(),
                direction: SortDirection::Desc,
                nulls: Some(NullsOrder::Last),
            })
            .limit(5)
            .offset(10);

        let compiled = compile(&query).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT Contact.LastName FROM Contact \
             LEFT JOIN Account ON Account.id = Contact.AccountId \
             WHERE (Account.Name = 'O''Brien' AND Contact.FirstName IS NOT NULL \
             AND Contact.LastName IN ('l1', 'l2')) \
             ORDER BY Contact.LastName DESC NULLS LAST LIMIT 5 OFFSET 10"
        );
        // Filter-only relations do not widen the projection
        assert_eq!(compiled.projection.len(), 1);
    }

    #[test]
    fn test_bind_variables() {
        let registry = registry();
        let query = Query::select("Account", ["Name"]).filter(Condition::compare(
            "Id",
            CompareOp::Eq,
            Operand::Bind("accountId".into()),
        ));

        let mut bindings = Bindings::new();
        bindings.insert("accountId".into(), Value::from("12345"));
        let compiled = QueryCompiler::new(&registry).compile(&query, &bindings).unwrap();
        assert!(compiled.sql.ends_with("WHERE Account.Id = '12345'"));

        let err = QueryCompiler::new(&registry)
            .compile(&query, &Bindings::new())
            .unwrap_err();
        assert_eq!(err, CompileError::UnboundVariable { name: "accountId".into() });
    }

    #[test]
    fn test_offset_without_limit() {
        let compiled = compile(&Query::select("Account", ["Name"]).offset(3)).unwrap();
        assert!(compiled.sql.ends_with("LIMIT -1 OFFSET 3"));
    }

    #[test]
    fn test_empty_in_list() {
        let query = Query::select("Account", ["Name"]).filter(Condition::compare(
            "Name",
            CompareOp::NotIn,
            Operand::List(Vec::new()),
        ));
        assert!(compile(&query).unwrap().sql.ends_with("WHERE 1"));
    }

    #[test]
    fn test_unknown_class() {
        let err = compile(&Query::select("Opportunity", ["Name"])).unwrap_err();
        assert_eq!(err, CompileError::UnknownClass { name: "Opportunity".into() });
    }

    #[test]
    fn test_unknown_relation() {
        let err = compile(&Query::select("Contact", ["Owner.Name"])).unwrap_err();
        assert!(matches!(err, CompileError::UnknownRelation { ref relation, .. } if relation == "Owner"));
    }

    #[test]
    fn test_empty_selection_and_paths() {
        let err = compile(&Query::select("Account", Vec::<FieldPath>::new())).unwrap_err();
        assert!(matches!(err, CompileError::EmptySelection { .. }));

        let err = compile(&Query::select("Account", ["Name", ""])).unwrap_err();
        assert_eq!(err, CompileError::EmptyFieldPath { index: 1 });
    }

    #[test]
    fn test_duplicate_and_invalid_fields() {
        let err = compile(&Query::select("Account", ["Name", "Name"])).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateField { .. }));

        let err = compile(&Query::select("Account", ["Name FROM x; --"])).unwrap_err();
        assert!(matches!(err, CompileError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_path_alias_cannot_shadow_another_join() {
        let mut builder = RegistryBuilder::new();
        for name in ["Account", "Contact", "User", "Account_User"] {
            builder.register_class(ClassType::new(name)).unwrap();
        }
        let registry = builder.build();
        let compiler = QueryCompiler::new(&registry);

        let err = compiler
            .compile(&Query::select("Contact", ["Account.User.Name", "Account_User.Name"]), &Bindings::new())
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::AliasCollision {
                alias: "Account_User".into(),
                path: "Account_User.Name".into(),
            }
        );

        let err = compiler
            .compile(&Query::select("Contact", ["Account_User.Name", "Account.User.Name"]), &Bindings::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::AliasCollision { ref path, .. } if path == "Account.User.Name"));

        // A nested alias may not shadow the queried table either
        let err = compiler
            .compile(&Query::select("Account_User", ["Account.User.Name"]), &Bindings::new())
            .unwrap_err();
        assert!(matches!(err, CompileError::AliasCollision { .. }));
    }

    #[test]
    fn test_paging_beyond_signed_range_is_rejected() {
        let err = compile(&Query::select("Account", ["Name"]).limit(u64::MAX)).unwrap_err();
        assert_eq!(
            err,
            CompileError::PagingOutOfRange {
                clause: "LIMIT".into(),
                value: u64::MAX,
            }
        );

        let err = compile(&Query::select("Account", ["Name"]).offset(i64::MAX as u64 + 1)).unwrap_err();
        assert!(matches!(err, CompileError::PagingOutOfRange { ref clause, .. } if clause == "OFFSET"));

        let compiled = compile(&Query::select("Account", ["Name"]).limit(i64::MAX as u64)).unwrap();
        assert!(compiled.sql.ends_with(&format!("LIMIT {}", i64::MAX)));
    }

    #[test]
    fn test_filter_fields_are_checked_in_order() {
        let query = Query::select("Contact", ["LastName"]).filter(Condition::Or(vec![
            Condition::eq("Account.Name", Literal::String("x".into())),
            Condition::Not(Box::new(Condition::eq("", Literal::String("y".into())))),
        ]));
        assert_eq!(compile(&query).unwrap_err(), CompileError::EmptyFieldPath { index: 1 });
    }

    #[test]
    fn test_self_relation_rejected() {
        let err = compile(&Query::select("Account", ["Account.Name"])).unwrap_err();
        assert!(matches!(err, CompileError::SelfRelation { .. }));
    }

    #[test]
    fn test_invalid_operands() {
        let query = Query::select("Account", ["Name"]).filter(Condition::compare(
            "Name",
            CompareOp::Lt,
            Operand::Literal(Literal::Null),
        ));
        assert!(matches!(compile(&query), Err(CompileError::InvalidOperand { .. })));

        let query = Query::select("Account", ["Name"]).filter(Condition::eq(
            "Name",
            Literal::String("x".into()),
        ));
        assert!(compile(&query).is_ok());

        let query = Query::select("Account", ["Name"]).filter(Condition::compare(
            "Name",
            CompareOp::In,
            Operand::Literal(Literal::String("x".into())),
        ));
        assert!(matches!(compile(&query), Err(CompileError::InvalidOperand { .. })));
    }
}
