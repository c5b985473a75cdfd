//! Enumeration primitive.

use std::fmt;
use std::str::FromStr;

use metaprep_types::text::{find_dupe, justify, Justify};

use crate::emitter::Emitter;
use crate::error::{CodegenError, CodegenResult};
use crate::scope::Scope;

/// How the member count of an enumeration is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountStyle {
    None,
    /// `#define Name_COUNT n`
    Define,
    /// `enum : type { Name_COUNT = n };`
    Enum,
    /// `static constexpr type Name_COUNT = n;`
    #[default]
    Constexpr,
}

impl FromStr for CountStyle {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CountStyle::None),
            "define" => Ok(CountStyle::Define),
            "enum" => Ok(CountStyle::Enum),
            "constexpr" => Ok(CountStyle::Constexpr),
            other => Err(CodegenError::UnknownCountStyle(other.to_string())),
        }
    }
}

impl fmt::Display for CountStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CountStyle::None => "none",
            CountStyle::Define => "define",
            CountStyle::Enum => "enum",
            CountStyle::Constexpr => "constexpr",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<String>,
}

impl EnumMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn valued(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// An enumeration to generate: `enum Name[ : type] { Name_MEMBER, ... };`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub underlying: Option<String>,
    pub members: Vec<EnumMember>,
    pub count: CountStyle,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, underlying: Option<&str>) -> Self {
        Self {
            name: name.into(),
            underlying: underlying.map(str::to_string),
            members: Vec::new(),
            count: CountStyle::default(),
        }
    }

    pub fn members<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(names.into_iter().map(EnumMember::new));
        self
    }

    /// Build the member list with a collector callback.
    pub fn collect(mut self, collector: impl FnOnce(&mut Vec<EnumMember>)) -> Self {
        collector(&mut self.members);
        self
    }

    pub fn count(mut self, count: CountStyle) -> Self {
        self.count = count;
        self
    }

    fn count_line(&self) -> Option<String> {
        let n = self.members.len();
        let name = &self.name;
        match (self.count, &self.underlying) {
            (CountStyle::None, _) => None,
            (CountStyle::Define, _) => Some(format!("#define {name}_COUNT {n}")),
            (CountStyle::Enum, Some(ty)) => Some(format!("enum : {ty} {{ {name}_COUNT = {n} }};")),
            (CountStyle::Enum, None) => Some(format!("enum {{ {name}_COUNT = {n} }};")),
            (CountStyle::Constexpr, ty) => Some(format!(
                "static constexpr {} {name}_COUNT = {n};",
                ty.as_deref().unwrap_or("int")
            )),
        }
    }
}

impl Emitter {
    /// Emit an enumeration followed by its count.
    pub fn enums(&mut self, def: &EnumDef) -> CodegenResult<()> {
        if def.members.is_empty() {
            return Err(CodegenError::EmptyEnum(def.name.clone()));
        }
        if let Some(member) = find_dupe(def.members.iter().map(|m| m.name.as_str())) {
            return Err(CodegenError::DuplicateEnumMember {
                enumeration: def.name.clone(),
                member: member.to_string(),
            });
        }

        let header = match &def.underlying {
            Some(ty) => format!("enum {} : {ty}", def.name),
            None => format!("enum {}", def.name),
        };
        let rows: Vec<Vec<(Justify, String)>> = def
            .members
            .iter()
            .map(|member| {
                let name = format!("{}_{}", def.name, member.name);
                match &member.value {
                    Some(value) => vec![(Justify::Left, name), (Justify::None, format!(" = {value},"))],
                    None => vec![(Justify::None, format!("{name},"))],
                }
            })
            .collect();
        let lines: Vec<String> = justify(&rows).into_iter().map(|cells| cells.concat()).collect();

        self.scoped(Scope::new(header), |e| {
            e.lines(&lines);
            Ok::<_, CodegenError>(())
        })?;
        if let Some(count) = def.count_line() {
            self.line(&count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(def: &EnumDef) -> String {
        let mut e = Emitter::with_receipt(false);
        e.reset("t.c:1", None);
        e.enums(def).unwrap();
        e.output().to_string()
    }

    #[test]
    fn test_plain_members() {
        let def = EnumDef::new("Color", Some("u8")).members(["RED", "GREEN"]);
        assert_eq!(
            render(&def),
            "enum Color : u8\n{\n    Color_RED,\n    Color_GREEN,\n};\nstatic constexpr u8 Color_COUNT = 2;\n"
        );
    }

    #[test]
    fn test_valued_members_align() {
        let def = EnumDef::new("Op", None)
            .collect(|m| {
                m.push(EnumMember::valued("ADD", "1"));
                m.push(EnumMember::valued("MULTIPLY", "2"));
                m.push(EnumMember::new("NOP"));
            })
            .count(CountStyle::None);
        assert_eq!(
            render(&def),
            "enum Op\n{\n    Op_ADD      = 1,\n    Op_MULTIPLY = 2,\n    Op_NOP,\n};\n"
        );
    }

    #[test]
    fn test_count_styles() {
        let base = EnumDef::new("K", None).members(["A"]);
        assert!(render(&base.clone().count(CountStyle::Define)).ends_with("#define K_COUNT 1\n"));
        assert!(render(&base.clone().count(CountStyle::Enum)).ends_with("enum { K_COUNT = 1 };\n"));
        assert!(render(&base.count(CountStyle::Constexpr))
            .ends_with("static constexpr int K_COUNT = 1;\n"));
    }

    #[test]
    fn test_empty_enum_rejected() {
        let mut e = Emitter::with_receipt(false);
        let err = e.enums(&EnumDef::new("None_", None)).unwrap_err();
        assert_eq!(err, CodegenError::EmptyEnum("None_".into()));
        assert_eq!(e.output(), "");
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut e = Emitter::with_receipt(false);
        let def = EnumDef::new("Color", Some("u8")).members(["RED", "GREEN", "RED"]);
        let err = e.enums(&def).unwrap_err();
        assert_eq!(
            err,
            CodegenError::DuplicateEnumMember {
                enumeration: "Color".into(),
                member: "RED".into(),
            }
        );
        assert_eq!(e.output(), "");
    }

    #[test]
    fn test_count_style_names() {
        assert_eq!("enum".parse::<CountStyle>().unwrap(), CountStyle::Enum);
        assert!("sometimes".parse::<CountStyle>().is_err());
    }
}
