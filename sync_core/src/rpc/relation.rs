//! Relational write-shape encoding: a Many2one field is written as a bare
//! integer id; One2many/Many2many fields are written as a list of
//! `[op, id, values]` command tuples, `op` one of create(0)/update(1)/
//! delete(2)/unlink(3)/link(4)/clear(5)/replace(6).

use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub enum RelationCommand {
    Create(Value),
    Update(i64, Value),
    Delete(i64),
    Unlink(i64),
    Link(i64),
    Clear,
    Replace(Vec<i64>),
}

pub fn encode_relation_commands(commands: &[RelationCommand]) -> Value {
    Value::Array(commands.iter().map(encode_one).collect())
}

fn encode_one(command: &RelationCommand) -> Value {
    match command {
        RelationCommand::Create(values) => json!([0, 0, values]),
        RelationCommand::Update(id, values) => json!([1, id, values]),
        RelationCommand::Delete(id) => json!([2, id, 0]),
        RelationCommand::Unlink(id) => json!([3, id, 0]),
        RelationCommand::Link(id) => json!([4, id, 0]),
        RelationCommand::Clear => json!([5, 0, 0]),
        RelationCommand::Replace(ids) => json!([6, 0, ids]),
    }
}

pub fn encode_many2one(id: i64) -> Value {
    Value::from(id)
}
