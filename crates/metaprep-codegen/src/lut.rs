//! Lookup-table primitive.
//!
//! ```c
//! static const struct { int code; typeof("x") label; } ERRORS[] =
//!     {
//!         [0] = { .code = 10, .label = "ok"   },
//!         [3] = { .code = 20, .label = "fail" },
//!     };
//! ```

use indexmap::IndexMap;
use metaprep_types::text::{find_dupe, justify, Justify};

use crate::emitter::Emitter;
use crate::error::{CodegenError, CodegenResult};
use crate::scope::Scope;

/// One designated member of a row; `value` is already rendered as C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LutMember {
    pub ty: Option<String>,
    pub name: String,
    pub value: String,
}

impl LutMember {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            ty: None,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn typed(ty: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            ty: Some(ty.into()),
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LutRow {
    pub index: Option<String>,
    pub members: Vec<LutMember>,
}

/// A table to generate. Without `ty`, the element type is a struct built
/// from the members, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut {
    pub ty: Option<String>,
    pub name: String,
    pub rows: Vec<LutRow>,
}

impl Lut {
    fn validate(&self) -> CodegenResult<()> {
        if self.rows.is_empty() {
            return Err(CodegenError::EmptyLut(self.name.clone()));
        }
        let indexed = self.rows.iter().filter(|r| r.index.is_some()).count();
        if indexed != 0 && indexed != self.rows.len() {
            return Err(CodegenError::MalformedLut {
                table: self.name.clone(),
                reason: "either every entry has an index or none does".to_string(),
            });
        }
        if let Some(index) = find_dupe(self.rows.iter().filter_map(|r| r.index.as_deref())) {
            return Err(CodegenError::DuplicateLutIndex {
                table: self.name.clone(),
                index: index.to_string(),
            });
        }
        for row in &self.rows {
            if row.members.is_empty() {
                return Err(CodegenError::MalformedLut {
                    table: self.name.clone(),
                    reason: "an entry has no members".to_string(),
                });
            }
            if let Some(field) = find_dupe(row.members.iter().map(|m| m.name.as_str())) {
                return Err(CodegenError::DuplicateLutField {
                    table: self.name.clone(),
                    field: field.to_string(),
                });
            }
            if self.ty.is_some() {
                if let Some(member) = row.members.iter().find(|m| m.ty.is_some()) {
                    return Err(CodegenError::TypedLutMember {
                        table: self.name.clone(),
                        field: member.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The element type: the explicit one, or a synthesized struct.
    fn element_type(&self) -> String {
        if let Some(ty) = &self.ty {
            return ty.clone();
        }
        let mut fields: IndexMap<&str, String> = IndexMap::new();
        for member in self.rows.iter().flat_map(|r| &r.members) {
            fields.entry(member.name.as_str()).or_insert_with(|| {
                member
                    .ty
                    .clone()
                    .unwrap_or_else(|| format!("typeof({})", member.value))
            });
        }
        let fields: Vec<String> = fields
            .iter()
            .map(|(name, ty)| format!("{ty} {name};"))
            .collect();
        format!("struct {{ {} }}", fields.join(" "))
    }
}

impl Emitter {
    /// Emit a `static const` lookup table.
    pub fn lut(&mut self, lut: &Lut) -> CodegenResult<()> {
        lut.validate()?;

        let rows: Vec<Vec<(Justify, String)>> = lut
            .rows
            .iter()
            .map(|row| {
                let mut cells = Vec::new();
                if let Some(index) = &row.index {
                    cells.push((Justify::Left, format!("[{index}]")));
                    cells.push((Justify::None, " = { ".to_string()));
                } else {
                    cells.push((Justify::None, "{ ".to_string()));
                }
                let last = row.members.len() - 1;
                for (i, member) in row.members.iter().enumerate() {
                    let sep = if i == last { "" } else { ", " };
                    cells.push((Justify::Left, format!(".{} = {}{sep}", member.name, member.value)));
                }
                cells.push((Justify::None, " },".to_string()));
                cells
            })
            .collect();
        let lines: Vec<String> = justify(&rows).into_iter().map(|cells| cells.concat()).collect();

        let header = format!("static const {} {}[] =", lut.element_type(), lut.name);
        self.scoped(Scope::new(header), |e| {
            e.lines(&lines);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> Emitter {
        let mut e = Emitter::with_receipt(false);
        e.reset("t.c:1", None);
        e
    }

    #[test]
    fn test_typed_table() {
        let mut e = emitter();
        let lut = Lut {
            ty: Some("struct Pin".into()),
            name: "PINS".into(),
            rows: vec![
                LutRow {
                    index: Some("0".into()),
                    members: vec![LutMember::new("port", "1"), LutMember::new("bit", "4")],
                },
                LutRow {
                    index: Some("10".into()),
                    members: vec![LutMember::new("port", "12"), LutMember::new("bit", "0")],
                },
            ],
        };
        e.lut(&lut).unwrap();
        assert_eq!(
            e.output(),
            "static const struct Pin PINS[] =\n    {\n        [0]  = { .port = 1,  .bit = 4 },\n        [10] = { .port = 12, .bit = 0 },\n    };\n"
        );
    }

    #[test]
    fn test_synthesized_struct() {
        let mut e = emitter();
        let lut = Lut {
            ty: None,
            name: "T".into(),
            rows: vec![LutRow {
                index: None,
                members: vec![LutMember::typed("int", "a", "1"), LutMember::new("b", "\"x\"")],
            }],
        };
        e.lut(&lut).unwrap();
        assert!(e
            .output()
            .starts_with("static const struct { int a; typeof(\"x\") b; } T[] =\n"));
        assert!(e.output().contains("{ .a = 1, .b = \"x\" },"));
    }

    #[test]
    fn test_duplicate_index() {
        let row = LutRow {
            index: Some("1".into()),
            members: vec![LutMember::new("a", "1")],
        };
        let lut = Lut {
            ty: None,
            name: "T".into(),
            rows: vec![row.clone(), row],
        };
        let err = emitter().lut(&lut).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateLutIndex { index, .. } if index == "1"));
    }

    #[test]
    fn test_duplicate_field() {
        let lut = Lut {
            ty: None,
            name: "T".into(),
            rows: vec![LutRow {
                index: None,
                members: vec![LutMember::new("a", "1"), LutMember::new("a", "2")],
            }],
        };
        let err = emitter().lut(&lut).unwrap_err();
        assert!(matches!(err, CodegenError::DuplicateLutField { field, .. } if field == "a"));
    }

    #[test]
    fn test_typed_member_with_table_type() {
        let lut = Lut {
            ty: Some("struct S".into()),
            name: "T".into(),
            rows: vec![LutRow {
                index: None,
                members: vec![LutMember::typed("int", "a", "1")],
            }],
        };
        let err = emitter().lut(&lut).unwrap_err();
        assert!(matches!(err, CodegenError::TypedLutMember { .. }));
    }

    #[test]
    fn test_mixed_indices_rejected() {
        let lut = Lut {
            ty: None,
            name: "T".into(),
            rows: vec![
                LutRow {
                    index: Some("0".into()),
                    members: vec![LutMember::new("a", "1")],
                },
                LutRow {
                    index: None,
                    members: vec![LutMember::new("a", "2")],
                },
            ],
        };
        assert!(matches!(
            emitter().lut(&lut),
            Err(CodegenError::MalformedLut { .. })
        ));
    }
}
