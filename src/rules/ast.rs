use log::trace;
use pg_query::protobuf::node::Node;
use pg_query::protobuf::{
    AlterTableCmd, AlterTableType, ColumnDef, ConstrType, CreateStmt, DropBehavior, ObjectType,
    ReindexObjectType, TransactionStmtKind, TypeName, VariableSetKind, VariableSetStmt,
};
use pg_query::NodeRef;

use crate::error::{ContextualError, InnerError};

/// How a column default expression classifies for the instant-default rules.
/// Strictly syntactic: only a literal, or a single typecast around a literal,
/// counts as constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultExpr {
    Constant,
    NonConstant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColDefSummary {
    pub name: String,
    /// Last component of the qualified type name, e.g. `varchar` for
    /// `pg_catalog.varchar`.
    pub type_name: String,
    /// Number of type modifiers, e.g. 1 for `varchar(255)`, 2 for `numeric(10,2)`.
    pub type_mods: usize,
    pub not_null: bool,
    pub default: Option<DefaultExpr>,
    pub stored_generated: bool,
}

impl ColDefSummary {
    pub fn is_serial(&self) -> bool {
        matches!(
            self.type_name.as_str(),
            "serial" | "bigserial" | "smallserial" | "serial2" | "serial4" | "serial8"
        )
    }
}

/// Value assigned by a `SET` statement, kept raw for the duration parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Table,
    Index,
    Trigger,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameKind {
    Table,
    Column,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexKind {
    Index,
    Table,
    Schema,
    Database,
    System,
}

impl ReindexKind {
    /// REINDEX of a whole schema, database or system touches every index in it.
    pub fn is_wide(&self) -> bool {
        matches!(
            self,
            ReindexKind::Schema | ReindexKind::Database | ReindexKind::System
        )
    }
}

/// Represents an action taken in an ALTER TABLE statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterTableAction {
    AddColumn {
        column: ColDefSummary,
    },
    DropColumn {
        column: String,
    },
    AlterColumnType {
        column: String,
        type_name: String,
        type_mods: usize,
    },
    SetNotNull {
        column: String,
    },
    AddConstraint {
        name: String,
        constraint_type: ConstrType,
        use_index: bool,
        skip_validation: bool,
    },
    DropConstraint {
        name: String,
    },
    ValidateConstraint {
        name: String,
    },
    EnableTrigger {
        name: String,
    },
    DisableTrigger {
        name: String,
    },
    AttachPartition {
        partition: String,
    },
    DetachPartition {
        partition: String,
        concurrent: bool,
    },
    Unrecognized,
}

/// A linter-rule friendly representation of the postgres parse tree, carrying
/// only the fields the rule and policy engines inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementSummary {
    Ignored,
    SetVariable {
        name: String,
        value: Option<SetValue>,
        is_set_value: bool,
    },
    Transaction(TxOp),
    CreateTable {
        schema: String,
        name: String,
        if_not_exists: bool,
        columns: Vec<ColDefSummary>,
    },
    CreateTableAs {
        schema: String,
        name: String,
    },
    CreateIndex {
        schema: String,
        idxname: String,
        table: String,
        concurrently: bool,
        if_not_exists: bool,
    },
    AlterTable {
        schema: String,
        name: String,
        actions: Vec<AlterTableAction>,
    },
    Drop {
        kind: DropKind,
        names: Vec<String>,
        /// Table the dropped object hangs off, for `DROP TRIGGER ... ON t`.
        table: Option<String>,
        if_exists: bool,
        concurrent: bool,
    },
    Truncate {
        tables: Vec<String>,
        cascade: bool,
    },
    Rename {
        kind: RenameKind,
        table: String,
    },
    Delete {
        table: String,
        has_where: bool,
    },
    Update {
        table: String,
        has_where: bool,
    },
    VacuumFull {
        table: Option<String>,
    },
    AlterEnum {
        name: String,
    },
    Reindex {
        kind: ReindexKind,
        target: String,
        concurrent: bool,
    },
    RefreshMatView {
        name: String,
        concurrent: bool,
        skip_data: bool,
    },
    CreateTrigger {
        name: String,
        table: String,
    },
}

impl StatementSummary {
    /// Unqualified, case-folded table the statement primarily targets.
    pub fn target_table(&self) -> Option<String> {
        let name = match self {
            StatementSummary::CreateTable { name, .. } => Some(name),
            StatementSummary::CreateTableAs { name, .. } => Some(name),
            StatementSummary::CreateIndex { table, .. } => Some(table),
            StatementSummary::AlterTable { name, .. } => Some(name),
            StatementSummary::Drop {
                kind: DropKind::Table,
                names,
                ..
            } => names.first(),
            StatementSummary::Drop { table, .. } => table.as_ref(),
            StatementSummary::Truncate { tables, .. } => tables.first(),
            StatementSummary::Rename { table, .. } => Some(table),
            StatementSummary::Delete { table, .. } => Some(table),
            StatementSummary::Update { table, .. } => Some(table),
            StatementSummary::VacuumFull { table } => table.as_ref(),
            StatementSummary::RefreshMatView { name, .. } => Some(name),
            StatementSummary::CreateTrigger { table, .. } => Some(table),
            _ => None,
        };
        name.map(|n| fold_name(n))
    }

    /// Tables created by this statement, case-folded, for the visibility filter.
    pub fn created_tables(&self) -> Vec<String> {
        match self {
            StatementSummary::CreateTable { name, .. }
            | StatementSummary::CreateTableAs { name, .. } => vec![fold_name(name)],
            _ => vec![],
        }
    }
}

/// Case-fold an identifier the way unquoted SQL identifiers fold.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// The grammar's tag for a statement node, e.g. `AlterTableStmt`.
pub fn node_tag(statement: &NodeRef) -> &'static str {
    match statement {
        NodeRef::AlterTableStmt(_) => "AlterTableStmt",
        NodeRef::CreateStmt(_) => "CreateStmt",
        NodeRef::CreateTableAsStmt(_) => "CreateTableAsStmt",
        NodeRef::IndexStmt(_) => "IndexStmt",
        NodeRef::DropStmt(_) => "DropStmt",
        NodeRef::TruncateStmt(_) => "TruncateStmt",
        NodeRef::RenameStmt(_) => "RenameStmt",
        NodeRef::DeleteStmt(_) => "DeleteStmt",
        NodeRef::UpdateStmt(_) => "UpdateStmt",
        NodeRef::InsertStmt(_) => "InsertStmt",
        NodeRef::SelectStmt(_) => "SelectStmt",
        NodeRef::VacuumStmt(_) => "VacuumStmt",
        NodeRef::AlterEnumStmt(_) => "AlterEnumStmt",
        NodeRef::ReindexStmt(_) => "ReindexStmt",
        NodeRef::RefreshMatViewStmt(_) => "RefreshMatViewStmt",
        NodeRef::CreateTrigStmt(_) => "CreateTrigStmt",
        NodeRef::VariableSetStmt(_) => "VariableSetStmt",
        NodeRef::TransactionStmt(_) => "TransactionStmt",
        NodeRef::CreateEnumStmt(_) => "CreateEnumStmt",
        NodeRef::CreateFunctionStmt(_) => "CreateFunctionStmt",
        NodeRef::DoStmt(_) => "DoStmt",
        NodeRef::CommentStmt(_) => "CommentStmt",
        NodeRef::GrantStmt(_) => "GrantStmt",
        _ => "UnknownStmt",
    }
}

/// Describes a statement by simplifying the parse tree.
///
/// Unrecognized statements come back as `Ok(StatementSummary::Ignored)`;
/// errors are reserved for parse trees with an unexpected shape.
pub fn describe(statement: &NodeRef) -> crate::Result<StatementSummary> {
    trace!("describe: {:?}", node_tag(statement));
    match statement {
        NodeRef::VariableSetStmt(child) => set_statement(child),
        NodeRef::TransactionStmt(child) => transaction(child),
        NodeRef::CreateStmt(child) => create_table(child),
        NodeRef::CreateTableAsStmt(child) => create_table_as(child),
        NodeRef::IndexStmt(child) => create_index(child),
        NodeRef::AlterTableStmt(child) => alter_table(child),
        NodeRef::DropStmt(child) => drop_statement(child),
        NodeRef::TruncateStmt(child) => truncate(child),
        NodeRef::RenameStmt(child) => rename(child),
        NodeRef::DeleteStmt(child) => Ok(StatementSummary::Delete {
            table: relation_name(&child.relation)?,
            has_where: child.where_clause.is_some(),
        }),
        NodeRef::UpdateStmt(child) => Ok(StatementSummary::Update {
            table: relation_name(&child.relation)?,
            has_where: child.where_clause.is_some(),
        }),
        NodeRef::VacuumStmt(child) => vacuum(child),
        NodeRef::AlterEnumStmt(child) => Ok(StatementSummary::AlterEnum {
            name: joined_names(&child.type_name),
        }),
        NodeRef::ReindexStmt(child) => reindex(child),
        NodeRef::RefreshMatViewStmt(child) => Ok(StatementSummary::RefreshMatView {
            name: relation_name(&child.relation)?,
            concurrent: child.concurrent,
            skip_data: child.skip_data,
        }),
        NodeRef::CreateTrigStmt(child) => Ok(StatementSummary::CreateTrigger {
            name: child.trigname.clone(),
            table: relation_name(&child.relation)?,
        }),
        _ => Ok(StatementSummary::Ignored),
    }
}

fn set_statement(child: &VariableSetStmt) -> crate::Result<StatementSummary> {
    let is_set_value = VariableSetKind::from_i32(child.kind) == Some(VariableSetKind::VarSetValue);
    let value = child.args.first().and_then(|arg| match arg.node.as_ref() {
        Some(Node::AConst(a)) => match a.val.as_ref() {
            Some(pg_query::protobuf::a_const::Val::Ival(i)) => Some(SetValue::Int(i.ival as i64)),
            Some(pg_query::protobuf::a_const::Val::Sval(s)) => Some(SetValue::Str(s.sval.clone())),
            Some(pg_query::protobuf::a_const::Val::Fval(f)) => Some(SetValue::Str(f.fval.clone())),
            _ => None,
        },
        _ => None,
    });
    Ok(StatementSummary::SetVariable {
        name: child.name.to_lowercase(),
        value,
        is_set_value,
    })
}

fn transaction(child: &pg_query::protobuf::TransactionStmt) -> crate::Result<StatementSummary> {
    let op = match TransactionStmtKind::from_i32(child.kind) {
        Some(TransactionStmtKind::TransStmtBegin) | Some(TransactionStmtKind::TransStmtStart) => {
            TxOp::Begin
        }
        Some(TransactionStmtKind::TransStmtCommit) => TxOp::Commit,
        Some(TransactionStmtKind::TransStmtRollback) => TxOp::Rollback,
        Some(TransactionStmtKind::TransStmtSavepoint) => {
            TxOp::Savepoint(child.savepoint_name.clone())
        }
        Some(TransactionStmtKind::TransStmtRelease) => TxOp::Release(child.savepoint_name.clone()),
        Some(TransactionStmtKind::TransStmtRollbackTo) => {
            TxOp::RollbackTo(child.savepoint_name.clone())
        }
        _ => return Ok(StatementSummary::Ignored),
    };
    Ok(StatementSummary::Transaction(op))
}

fn create_table(child: &CreateStmt) -> crate::Result<StatementSummary> {
    if let Some(rel) = &child.relation {
        let columns = child
            .table_elts
            .iter()
            .filter_map(|node| match node.node.as_ref().map(|n| n.to_ref()) {
                Some(NodeRef::ColumnDef(coldef)) => Some(column_def(coldef)),
                _ => None,
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(StatementSummary::CreateTable {
            schema: rel.schemaname.clone(),
            name: rel.relname.clone(),
            if_not_exists: child.if_not_exists,
            columns,
        })
    } else {
        Err(InnerError::AstShape("CREATE TABLE without a relation".into()).into())
    }
}

fn create_table_as(
    child: &pg_query::protobuf::CreateTableAsStmt,
) -> crate::Result<StatementSummary> {
    child
        .into
        .as_ref()
        .and_then(|dest| dest.rel.as_ref())
        .map(|rel| StatementSummary::CreateTableAs {
            schema: rel.schemaname.clone(),
            name: rel.relname.clone(),
        })
        .ok_or_else(|| InnerError::AstShape("CREATE TABLE AS without a relation".into()).into())
}

fn create_index(child: &pg_query::protobuf::IndexStmt) -> crate::Result<StatementSummary> {
    if let Some(rel) = &child.relation {
        Ok(StatementSummary::CreateIndex {
            schema: rel.schemaname.clone(),
            idxname: child.idxname.clone(),
            table: rel.relname.clone(),
            concurrently: child.concurrent,
            if_not_exists: child.if_not_exists,
        })
    } else {
        Err(InnerError::AstShape("CREATE INDEX without a relation".into()).into())
    }
}

fn drop_statement(child: &pg_query::protobuf::DropStmt) -> crate::Result<StatementSummary> {
    let kind = match ObjectType::from_i32(child.remove_type) {
        Some(ObjectType::ObjectTable) => DropKind::Table,
        Some(ObjectType::ObjectIndex) => DropKind::Index,
        Some(ObjectType::ObjectTrigger) => DropKind::Trigger,
        _ => DropKind::Other,
    };
    let mut names = Vec::new();
    let mut table = None;
    for object in &child.objects {
        match object.node.as_ref() {
            Some(Node::List(list)) => {
                let parts: Vec<String> = list
                    .items
                    .iter()
                    .filter_map(|item| match item.node.as_ref() {
                        Some(Node::String(s)) => Some(s.sval.clone()),
                        _ => None,
                    })
                    .collect();
                if kind == DropKind::Trigger {
                    // DROP TRIGGER name ON table parses as [schema?, table, trigger]
                    if let Some((trigger, qualifier)) = parts.split_last() {
                        names.push(trigger.clone());
                        table = qualifier.last().cloned();
                    }
                } else if let Some(last) = parts.last() {
                    names.push(last.clone());
                }
            }
            Some(Node::String(s)) => names.push(s.sval.clone()),
            _ => {}
        }
    }
    Ok(StatementSummary::Drop {
        kind,
        names,
        table,
        if_exists: child.missing_ok,
        concurrent: child.concurrent,
    })
}

fn truncate(child: &pg_query::protobuf::TruncateStmt) -> crate::Result<StatementSummary> {
    let tables = child
        .relations
        .iter()
        .filter_map(|node| match node.node.as_ref() {
            Some(Node::RangeVar(rel)) => Some(rel.relname.clone()),
            _ => None,
        })
        .collect();
    let cascade = DropBehavior::from_i32(child.behavior) == Some(DropBehavior::DropCascade);
    Ok(StatementSummary::Truncate { tables, cascade })
}

fn rename(child: &pg_query::protobuf::RenameStmt) -> crate::Result<StatementSummary> {
    let kind = match ObjectType::from_i32(child.rename_type) {
        Some(ObjectType::ObjectTable) => RenameKind::Table,
        Some(ObjectType::ObjectColumn) => RenameKind::Column,
        _ => RenameKind::Other,
    };
    let table = child
        .relation
        .as_ref()
        .map(|rel| rel.relname.clone())
        .unwrap_or_default();
    Ok(StatementSummary::Rename { kind, table })
}

fn vacuum(child: &pg_query::protobuf::VacuumStmt) -> crate::Result<StatementSummary> {
    let full = child.options.iter().any(|opt| match opt.node.as_ref() {
        Some(Node::DefElem(def)) => def.defname.eq_ignore_ascii_case("full"),
        _ => false,
    });
    if !full || !child.is_vacuumcmd {
        return Ok(StatementSummary::Ignored);
    }
    let table = child.rels.first().and_then(|rel| match rel.node.as_ref() {
        Some(Node::VacuumRelation(vr)) => vr.relation.as_ref().map(|r| r.relname.clone()),
        _ => None,
    });
    Ok(StatementSummary::VacuumFull { table })
}

fn reindex(child: &pg_query::protobuf::ReindexStmt) -> crate::Result<StatementSummary> {
    let kind = match ReindexObjectType::from_i32(child.kind) {
        Some(ReindexObjectType::ReindexObjectIndex) => ReindexKind::Index,
        Some(ReindexObjectType::ReindexObjectTable) => ReindexKind::Table,
        Some(ReindexObjectType::ReindexObjectSchema) => ReindexKind::Schema,
        Some(ReindexObjectType::ReindexObjectDatabase) => ReindexKind::Database,
        Some(ReindexObjectType::ReindexObjectSystem) => ReindexKind::System,
        _ => ReindexKind::Table,
    };
    let concurrent = child.params.iter().any(|param| match param.node.as_ref() {
        Some(Node::DefElem(def)) => def.defname.eq_ignore_ascii_case("concurrently"),
        _ => false,
    });
    let target = child
        .relation
        .as_ref()
        .map(|rel| rel.relname.clone())
        .unwrap_or_else(|| child.name.clone());
    Ok(StatementSummary::Reindex {
        kind,
        target,
        concurrent,
    })
}

fn alter_table(child: &pg_query::protobuf::AlterTableStmt) -> crate::Result<StatementSummary> {
    if let Some(rel) = &child.relation {
        let actions = child
            .cmds
            .iter()
            .map(|cmd| match cmd.node.as_ref().map(|n| n.to_ref()) {
                Some(NodeRef::AlterTableCmd(cmd)) => alter_table_action(cmd),
                other => Err(InnerError::AstShape(format!(
                    "ALTER TABLE with an unrecognized command node: {other:?}"
                ))
                .into()),
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(StatementSummary::AlterTable {
            schema: rel.schemaname.clone(),
            name: rel.relname.clone(),
            actions,
        })
    } else {
        Err(InnerError::AstShape("ALTER TABLE without a relation".into()).into())
    }
}

fn alter_table_action(child: &AlterTableCmd) -> crate::Result<AlterTableAction> {
    let subtype = match AlterTableType::from_i32(child.subtype) {
        Some(subtype) => subtype,
        None => return Ok(AlterTableAction::Unrecognized),
    };
    trace!("alter table action: {:?}", subtype);
    match subtype {
        AlterTableType::AtAddColumn => Ok(AlterTableAction::AddColumn {
            column: column_def(expect_coldef(child)?)?,
        }),
        AlterTableType::AtDropColumn => Ok(AlterTableAction::DropColumn {
            column: child.name.clone(),
        }),
        AlterTableType::AtAlterColumnType => {
            let col = expect_coldef(child)?;
            let (type_name, type_mods) = col
                .type_name
                .as_ref()
                .map(type_name_parts)
                .ok_or_else(|| {
                    InnerError::AstShape("ALTER COLUMN TYPE without a type".into())
                })?;
            Ok(AlterTableAction::AlterColumnType {
                column: child.name.clone(),
                type_name,
                type_mods,
            })
        }
        AlterTableType::AtSetNotNull => Ok(AlterTableAction::SetNotNull {
            column: child.name.clone(),
        }),
        AlterTableType::AtAddConstraint => {
            let def = expect_constraint(child)?;
            let constraint_type = ConstrType::from_i32(def.contype).ok_or_else(|| {
                InnerError::AstShape(format!("invalid constraint type: {}", def.contype))
            })?;
            Ok(AlterTableAction::AddConstraint {
                name: def.conname.clone(),
                constraint_type,
                use_index: !def.indexname.is_empty(),
                skip_validation: def.skip_validation,
            })
        }
        AlterTableType::AtDropConstraint => Ok(AlterTableAction::DropConstraint {
            name: child.name.clone(),
        }),
        AlterTableType::AtValidateConstraint => Ok(AlterTableAction::ValidateConstraint {
            name: child.name.clone(),
        }),
        AlterTableType::AtEnableTrig
        | AlterTableType::AtEnableAlwaysTrig
        | AlterTableType::AtEnableReplicaTrig
        | AlterTableType::AtEnableTrigAll
        | AlterTableType::AtEnableTrigUser => Ok(AlterTableAction::EnableTrigger {
            name: child.name.clone(),
        }),
        AlterTableType::AtDisableTrig
        | AlterTableType::AtDisableTrigAll
        | AlterTableType::AtDisableTrigUser => Ok(AlterTableAction::DisableTrigger {
            name: child.name.clone(),
        }),
        AlterTableType::AtAttachPartition => Ok(AlterTableAction::AttachPartition {
            partition: partition_name(child),
        }),
        AlterTableType::AtDetachPartition => Ok(AlterTableAction::DetachPartition {
            partition: partition_name(child),
            concurrent: partition_concurrent(child),
        }),
        _ => Ok(AlterTableAction::Unrecognized),
    }
}

fn partition_name(child: &AlterTableCmd) -> String {
    match child.def.as_ref().and_then(|def| def.node.as_ref()) {
        Some(Node::PartitionCmd(cmd)) => cmd
            .name
            .as_ref()
            .map(|rel| rel.relname.clone())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn partition_concurrent(child: &AlterTableCmd) -> bool {
    match child.def.as_ref().and_then(|def| def.node.as_ref()) {
        Some(Node::PartitionCmd(cmd)) => cmd.concurrent,
        _ => false,
    }
}

fn column_def(coldef: &ColumnDef) -> crate::Result<ColDefSummary> {
    let (type_name, type_mods) = coldef
        .type_name
        .as_ref()
        .map(type_name_parts)
        .ok_or_else(|| {
            InnerError::AstShape(format!("column {} has no type name", coldef.colname))
                .with_context("column definition")
        })?;
    let mut not_null = coldef.is_not_null;
    let mut default = None;
    let mut stored_generated = false;
    for constraint in &coldef.constraints {
        if let Some(Node::Constraint(cons)) = constraint.node.as_ref() {
            match ConstrType::from_i32(cons.contype) {
                Some(ConstrType::ConstrNotnull) => not_null = true,
                Some(ConstrType::ConstrDefault) => {
                    default = Some(classify_default(cons.raw_expr.as_deref()));
                }
                Some(ConstrType::ConstrGenerated) if cons.generated_when == "a" => {
                    stored_generated = true;
                }
                Some(ConstrType::ConstrPrimary) => not_null = true,
                _ => {}
            }
        }
    }
    Ok(ColDefSummary {
        name: coldef.colname.clone(),
        type_name,
        type_mods,
        not_null,
        default,
        stored_generated,
    })
}

/// Only `A_Const`, or one `TypeCast` directly wrapping `A_Const`, counts as
/// constant. Function calls and deeper cast towers are non-constant; the
/// analyzer does not reason about function immutability.
fn classify_default(expr: Option<&pg_query::protobuf::Node>) -> DefaultExpr {
    match expr.and_then(|node| node.node.as_ref()) {
        Some(Node::AConst(_)) => DefaultExpr::Constant,
        Some(Node::TypeCast(cast)) => match cast.arg.as_ref().and_then(|arg| arg.node.as_ref()) {
            Some(Node::AConst(_)) => DefaultExpr::Constant,
            _ => DefaultExpr::NonConstant,
        },
        _ => DefaultExpr::NonConstant,
    }
}

/// Last component of the qualified type name plus the modifier count.
fn type_name_parts(tp: &TypeName) -> (String, usize) {
    let name = tp
        .names
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(Node::String(s)) => Some(s.sval.as_str()),
            _ => None,
        })
        .last()
        .unwrap_or_default()
        .to_string();
    (name, tp.typmods.len())
}

fn relation_name(
    relation: &Option<pg_query::protobuf::RangeVar>,
) -> crate::Result<String> {
    relation
        .as_ref()
        .map(|rel| rel.relname.clone())
        .ok_or_else(|| InnerError::AstShape("statement without a relation".into()).into())
}

fn joined_names(names: &[pg_query::protobuf::Node]) -> String {
    names
        .iter()
        .filter_map(|n| match n.node.as_ref() {
            Some(Node::String(s)) => Some(s.sval.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_s(s: &str) -> StatementSummary {
        describe(
            &pg_query::parse(s).unwrap().protobuf.stmts[0]
                .stmt
                .as_ref()
                .unwrap()
                .node
                .as_ref()
                .unwrap()
                .to_ref(),
        )
        .unwrap()
    }

    fn alter_actions(s: &str) -> Vec<AlterTableAction> {
        match parse_s(s) {
            StatementSummary::AlterTable { actions, .. } => actions,
            other => panic!("expected AlterTable, got {other:?}"),
        }
    }

    #[test]
    fn set_lock_timeout() {
        assert_eq!(
            parse_s("SET lock_timeout = '2s'"),
            StatementSummary::SetVariable {
                name: "lock_timeout".to_string(),
                value: Some(SetValue::Str("2s".to_string())),
                is_set_value: true,
            }
        );
        assert_eq!(
            parse_s("SET statement_timeout = 30000"),
            StatementSummary::SetVariable {
                name: "statement_timeout".to_string(),
                value: Some(SetValue::Int(30000)),
                is_set_value: true,
            }
        );
    }

    #[test]
    fn transaction_ops() {
        assert_eq!(parse_s("BEGIN"), StatementSummary::Transaction(TxOp::Begin));
        assert_eq!(
            parse_s("COMMIT"),
            StatementSummary::Transaction(TxOp::Commit)
        );
        assert_eq!(
            parse_s("SAVEPOINT sp1"),
            StatementSummary::Transaction(TxOp::Savepoint("sp1".to_string()))
        );
        assert_eq!(
            parse_s("ROLLBACK TO SAVEPOINT sp1"),
            StatementSummary::Transaction(TxOp::RollbackTo("sp1".to_string()))
        );
        assert_eq!(
            parse_s("RELEASE SAVEPOINT sp1"),
            StatementSummary::Transaction(TxOp::Release("sp1".to_string()))
        );
    }

    #[test]
    fn add_column_not_null_without_default() {
        let actions = alter_actions("ALTER TABLE users ADD COLUMN status varchar(20) NOT NULL");
        assert_eq!(
            actions,
            vec![AlterTableAction::AddColumn {
                column: ColDefSummary {
                    name: "status".to_string(),
                    type_name: "varchar".to_string(),
                    type_mods: 1,
                    not_null: true,
                    default: None,
                    stored_generated: false,
                }
            }]
        );
    }

    #[test]
    fn constant_default_is_syntactic() {
        let constant = alter_actions("ALTER TABLE t ADD COLUMN c int DEFAULT 0");
        assert!(matches!(
            &constant[0],
            AlterTableAction::AddColumn { column } if column.default == Some(DefaultExpr::Constant)
        ));
        let cast = alter_actions("ALTER TABLE t ADD COLUMN c uuid DEFAULT 'x'::uuid");
        assert!(matches!(
            &cast[0],
            AlterTableAction::AddColumn { column } if column.default == Some(DefaultExpr::Constant)
        ));
        let call = alter_actions("ALTER TABLE t ADD COLUMN c uuid DEFAULT gen_random_uuid()");
        assert!(matches!(
            &call[0],
            AlterTableAction::AddColumn { column } if column.default == Some(DefaultExpr::NonConstant)
        ));
        let now = alter_actions("ALTER TABLE t ADD COLUMN c timestamptz DEFAULT now()");
        assert!(matches!(
            &now[0],
            AlterTableAction::AddColumn { column } if column.default == Some(DefaultExpr::NonConstant)
        ));
    }

    #[test]
    fn stored_generated_column() {
        let actions = alter_actions(
            "ALTER TABLE t ADD COLUMN total numeric GENERATED ALWAYS AS (price * qty) STORED",
        );
        assert!(matches!(
            &actions[0],
            AlterTableAction::AddColumn { column } if column.stored_generated
        ));
    }

    #[test]
    fn alter_column_type_shapes() {
        let text = alter_actions("ALTER TABLE t ALTER COLUMN c TYPE text");
        assert_eq!(
            text,
            vec![AlterTableAction::AlterColumnType {
                column: "c".to_string(),
                type_name: "text".to_string(),
                type_mods: 0,
            }]
        );
        let sized = alter_actions("ALTER TABLE t ALTER COLUMN c TYPE varchar(100)");
        assert_eq!(
            sized,
            vec![AlterTableAction::AlterColumnType {
                column: "c".to_string(),
                type_name: "varchar".to_string(),
                type_mods: 1,
            }]
        );
    }

    #[test]
    fn add_constraint_captures_validation() {
        let fk = alter_actions(
            "ALTER TABLE orders ADD CONSTRAINT fk FOREIGN KEY (uid) REFERENCES users (id) NOT VALID",
        );
        assert_eq!(
            fk,
            vec![AlterTableAction::AddConstraint {
                name: "fk".to_string(),
                constraint_type: ConstrType::ConstrForeign,
                use_index: false,
                skip_validation: true,
            }]
        );
        let unique = alter_actions("ALTER TABLE t ADD CONSTRAINT u UNIQUE USING INDEX idx");
        assert_eq!(
            unique,
            vec![AlterTableAction::AddConstraint {
                name: "u".to_string(),
                constraint_type: ConstrType::ConstrUnique,
                use_index: true,
                skip_validation: false,
            }]
        );
    }

    #[test]
    fn validate_constraint() {
        let actions = alter_actions("ALTER TABLE t VALIDATE CONSTRAINT c");
        assert_eq!(
            actions,
            vec![AlterTableAction::ValidateConstraint {
                name: "c".to_string()
            }]
        );
    }

    #[test]
    fn partitions() {
        let attach =
            alter_actions("ALTER TABLE measurements ATTACH PARTITION m2024 FOR VALUES FROM (1) TO (10)");
        assert_eq!(
            attach,
            vec![AlterTableAction::AttachPartition {
                partition: "m2024".to_string()
            }]
        );
        let detach = alter_actions("ALTER TABLE measurements DETACH PARTITION m2023");
        assert_eq!(
            detach,
            vec![AlterTableAction::DetachPartition {
                partition: "m2023".to_string(),
                concurrent: false,
            }]
        );
        let concurrent =
            alter_actions("ALTER TABLE measurements DETACH PARTITION m2023 CONCURRENTLY");
        assert_eq!(
            concurrent,
            vec![AlterTableAction::DetachPartition {
                partition: "m2023".to_string(),
                concurrent: true,
            }]
        );
    }

    #[test]
    fn drop_statements() {
        assert_eq!(
            parse_s("DROP TABLE old_data"),
            StatementSummary::Drop {
                kind: DropKind::Table,
                names: vec!["old_data".to_string()],
                table: None,
                if_exists: false,
                concurrent: false,
            }
        );
        assert_eq!(
            parse_s("DROP INDEX CONCURRENTLY IF EXISTS idx"),
            StatementSummary::Drop {
                kind: DropKind::Index,
                names: vec!["idx".to_string()],
                table: None,
                if_exists: true,
                concurrent: true,
            }
        );
        assert_eq!(
            parse_s("DROP TRIGGER trg ON public.users"),
            StatementSummary::Drop {
                kind: DropKind::Trigger,
                names: vec!["trg".to_string()],
                table: Some("users".to_string()),
                if_exists: false,
                concurrent: false,
            }
        );
    }

    #[test]
    fn truncate_cascade() {
        assert_eq!(
            parse_s("TRUNCATE users, orders CASCADE"),
            StatementSummary::Truncate {
                tables: vec!["users".to_string(), "orders".to_string()],
                cascade: true,
            }
        );
    }

    #[test]
    fn delete_and_update_where_detection() {
        assert_eq!(
            parse_s("DELETE FROM logs"),
            StatementSummary::Delete {
                table: "logs".to_string(),
                has_where: false,
            }
        );
        assert_eq!(
            parse_s("UPDATE users SET active = false WHERE id = 3"),
            StatementSummary::Update {
                table: "users".to_string(),
                has_where: true,
            }
        );
    }

    #[test]
    fn vacuum_full_only() {
        assert_eq!(
            parse_s("VACUUM FULL users"),
            StatementSummary::VacuumFull {
                table: Some("users".to_string())
            }
        );
        assert_eq!(parse_s("VACUUM ANALYZE users"), StatementSummary::Ignored);
    }

    #[test]
    fn reindex_kinds() {
        assert_eq!(
            parse_s("REINDEX TABLE users"),
            StatementSummary::Reindex {
                kind: ReindexKind::Table,
                target: "users".to_string(),
                concurrent: false,
            }
        );
        assert_eq!(
            parse_s("REINDEX (CONCURRENTLY) INDEX idx"),
            StatementSummary::Reindex {
                kind: ReindexKind::Index,
                target: "idx".to_string(),
                concurrent: true,
            }
        );
        assert_eq!(
            parse_s("REINDEX SCHEMA public"),
            StatementSummary::Reindex {
                kind: ReindexKind::Schema,
                target: "public".to_string(),
                concurrent: false,
            }
        );
    }

    #[test]
    fn refresh_matview_flags() {
        assert_eq!(
            parse_s("REFRESH MATERIALIZED VIEW CONCURRENTLY mv"),
            StatementSummary::RefreshMatView {
                name: "mv".to_string(),
                concurrent: true,
                skip_data: false,
            }
        );
        assert_eq!(
            parse_s("REFRESH MATERIALIZED VIEW mv WITH NO DATA"),
            StatementSummary::RefreshMatView {
                name: "mv".to_string(),
                concurrent: false,
                skip_data: true,
            }
        );
    }

    #[test]
    fn rename_kinds() {
        assert_eq!(
            parse_s("ALTER TABLE users RENAME TO people"),
            StatementSummary::Rename {
                kind: RenameKind::Table,
                table: "users".to_string(),
            }
        );
        assert_eq!(
            parse_s("ALTER TABLE users RENAME COLUMN email TO mail"),
            StatementSummary::Rename {
                kind: RenameKind::Column,
                table: "users".to_string(),
            }
        );
    }

    #[test]
    fn alter_enum() {
        assert_eq!(
            parse_s("ALTER TYPE status ADD VALUE 'archived'"),
            StatementSummary::AlterEnum {
                name: "status".to_string()
            }
        );
    }

    #[test]
    fn create_table_column_summaries() {
        match parse_s("CREATE TABLE t (id serial PRIMARY KEY, body json, n int)") {
            StatementSummary::CreateTable { columns, .. } => {
                assert_eq!(columns.len(), 3);
                assert!(columns[0].is_serial());
                assert!(columns[0].not_null);
                assert_eq!(columns[1].type_name, "json");
                assert_eq!(columns[2].type_name, "int4");
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn create_index_flags() {
        assert_eq!(
            parse_s("CREATE INDEX CONCURRENTLY IF NOT EXISTS idx ON users (email)"),
            StatementSummary::CreateIndex {
                schema: "".to_string(),
                idxname: "idx".to_string(),
                table: "users".to_string(),
                concurrently: true,
                if_not_exists: true,
            }
        );
    }

    #[test]
    fn target_table_is_case_folded() {
        let summary = parse_s(r#"ALTER TABLE "Users" ADD COLUMN x int"#);
        assert_eq!(summary.target_table(), Some("users".to_string()));
    }
}
