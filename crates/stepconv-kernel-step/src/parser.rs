//! Part 21 parser: builds the raw instance table from tokens.
//!
//! Instances are kept uninterpreted: an id plus one record (simple instance)
//! or several records (complex instance `#5 = (A() B(1.0));`).

use std::collections::BTreeMap;

use crate::error::StepError;
use crate::lexer::{Lexer, Spanned, Token};

/// A single argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference.
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Binary literal.
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration name.
    Enum(String),
    /// Nested list.
    List(Vec<StepValue>),
    /// Derived value `*`.
    Derived,
    /// Unset value `$`.
    Null,
    /// Typed value such as `LENGTH_MEASURE(25.4)`.
    Typed(Record),
}

impl StepValue {
    /// Entity reference, if this is one.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Numeric value; integers and single-valued typed measures are accepted.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            StepValue::Typed(record) if record.args.len() == 1 => record.args[0].as_real(),
            _ => None,
        }
    }

    /// String contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Enumeration name, if this is an enumeration.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Logical value from `.T.` / `.F.`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_enum()? {
            "T" | "TRUE" => Some(true),
            "F" | "FALSE" => Some(false),
            _ => None,
        }
    }

    /// List elements, if this is a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the value is `$`.
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }
}

/// A type name and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Type name, upper-case.
    pub name: String,
    /// Arguments in declaration order.
    pub args: Vec<StepValue>,
}

/// An instance from the DATA section.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntity {
    /// Instance id.
    pub id: u64,
    /// One record for simple instances, several for complex ones.
    pub records: Vec<Record>,
}

impl StepEntity {
    /// Type name of a simple instance, `None` for complex instances.
    pub fn type_name(&self) -> Option<&str> {
        match self.records.as_slice() {
            [single] => Some(&single.name),
            _ => None,
        }
    }

    /// The record with the given type name.
    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Printable type for diagnostics.
    pub fn describe(&self) -> String {
        match self.type_name() {
            Some(name) => name.to_string(),
            None => {
                let names: Vec<_> = self.records.iter().map(|r| r.name.as_str()).collect();
                format!("({})", names.join(" "))
            }
        }
    }
}

/// The parsed file.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    /// HEADER section records (FILE_DESCRIPTION, FILE_NAME, FILE_SCHEMA).
    pub header: Vec<Record>,
    /// DATA section instances by id, iterated in id order.
    pub entities: BTreeMap<u64, StepEntity>,
}

impl StepFile {
    /// Instance by id.
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Instance by id, or [`StepError::MissingEntity`].
    pub fn require(&self, id: u64) -> Result<&StepEntity, StepError> {
        self.get(id).ok_or(StepError::MissingEntity(id))
    }

    /// Simple instances of one of the given types, in id order.
    pub fn instances_of<'a>(
        &'a self,
        types: &'a [&'a str],
    ) -> impl Iterator<Item = &'a StepEntity> + 'a {
        self.entities
            .values()
            .filter(move |e| e.type_name().is_some_and(|t| types.iter().any(|ty| *ty == t)))
    }

    /// Schema names from the FILE_SCHEMA header record.
    pub fn schemas(&self) -> Vec<String> {
        self.header
            .iter()
            .filter(|r| r.name == "FILE_SCHEMA")
            .filter_map(|r| r.args.first()?.as_list())
            .flat_map(|list| list.iter().filter_map(|v| v.as_str().map(str::to_string)))
            .collect()
    }
}

/// Recursive-descent parser over a token stream.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    /// Parse a whole file.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser { tokens, pos: 0 }.file()
    }

    fn file(&mut self) -> Result<StepFile, StepError> {
        let mut file = StepFile::default();
        self.expect_keyword("ISO-10303-21")?;
        self.expect(&Token::Semicolon)?;

        loop {
            let Some(section) = self.keyword() else {
                return Err(self.unexpected("section keyword"));
            };
            self.pos += 1;
            match section.as_str() {
                "HEADER" => {
                    self.expect(&Token::Semicolon)?;
                    while !self.at_keyword("ENDSEC") {
                        file.header.push(self.record()?);
                        self.expect(&Token::Semicolon)?;
                    }
                    self.end_section()?;
                }
                "DATA" => {
                    // DATA may carry an optional parameter list in Part 21 ed. 3.
                    if self.at(&Token::LParen) {
                        self.args()?;
                    }
                    self.expect(&Token::Semicolon)?;
                    while !self.at_keyword("ENDSEC") {
                        let entity = self.instance()?;
                        file.entities.insert(entity.id, entity);
                    }
                    self.end_section()?;
                }
                "END-ISO-10303-21" => {
                    self.expect(&Token::Semicolon)?;
                    return Ok(file);
                }
                other => {
                    return Err(StepError::parser(
                        self.line(),
                        format!("unexpected section {other}"),
                    ))
                }
            }
        }
    }

    fn end_section(&mut self) -> Result<(), StepError> {
        self.expect_keyword("ENDSEC")?;
        self.expect(&Token::Semicolon)
    }

    fn instance(&mut self) -> Result<StepEntity, StepError> {
        let id = match self.peek() {
            Some(Token::EntityRef(id)) => *id,
            _ => return Err(self.unexpected("instance id")),
        };
        self.pos += 1;
        self.expect(&Token::Equals)?;

        let records = if self.at(&Token::LParen) {
            self.pos += 1;
            let mut records = Vec::new();
            while !self.at(&Token::RParen) {
                records.push(self.record()?);
            }
            self.pos += 1;
            if records.is_empty() {
                return Err(StepError::parser(
                    self.line(),
                    format!("empty complex instance #{id}"),
                ));
            }
            records
        } else {
            vec![self.record()?]
        };
        self.expect(&Token::Semicolon)?;
        Ok(StepEntity { id, records })
    }

    fn record(&mut self) -> Result<Record, StepError> {
        let Some(name) = self.keyword() else {
            return Err(self.unexpected("type name"));
        };
        self.pos += 1;
        let args = self.args()?;
        Ok(Record { name, args })
    }

    fn args(&mut self) -> Result<Vec<StepValue>, StepError> {
        self.expect(&Token::LParen)?;
        let mut values = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                values.push(self.value()?);
                if !self.at(&Token::Comma) {
                    break;
                }
                self.pos += 1;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(values)
    }

    fn value(&mut self) -> Result<StepValue, StepError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("value"));
        };
        let value = match token {
            Token::LParen => return self.args().map(StepValue::List),
            Token::Keyword(_) => return self.record().map(StepValue::Typed),
            Token::EntityRef(id) => StepValue::EntityRef(id),
            Token::String(s) => StepValue::String(s),
            Token::Binary(b) => StepValue::Binary(b),
            Token::Real(v) => StepValue::Real(v),
            Token::Integer(v) => StepValue::Integer(v),
            Token::Enum(e) => StepValue::Enum(e),
            Token::Asterisk => StepValue::Derived,
            Token::Dollar => StepValue::Null,
            _ => return Err(self.unexpected("value")),
        };
        self.pos += 1;
        Ok(value)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.line).unwrap_or(0)
    }

    fn keyword(&self) -> Option<String> {
        match self.peek() {
            Some(Token::Keyword(k)) => Some(k.clone()),
            _ => None,
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn at_keyword(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if k == name)
    }

    fn unexpected(&self, wanted: &str) -> StepError {
        match self.peek() {
            Some(tok) => StepError::parser(self.line(), format!("expected {wanted}, got {tok:?}")),
            None => StepError::parser(0, format!("expected {wanted}, got end of input")),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), StepError> {
        if self.at(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("{token:?}")))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.at_keyword(name) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &str) -> String {
        format!(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\n\
             FILE_SCHEMA(('AUTOMOTIVE_DESIGN'));\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n"
        )
    }

    #[test]
    fn parses_header_and_simple_instances() {
        let file = Parser::parse(
            wrap("#1 = CARTESIAN_POINT('origin', (0.0, 0.0, 0.0));\n#2 = DIRECTION('', (1., 0., 0.));")
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(file.header.len(), 2);
        assert_eq!(file.schemas(), vec!["AUTOMOTIVE_DESIGN".to_string()]);
        assert_eq!(file.entities.len(), 2);

        let p = file.get(1).unwrap();
        assert_eq!(p.type_name(), Some("CARTESIAN_POINT"));
        let coords = p.records[0].args[1].as_list().unwrap();
        assert_eq!(coords[2].as_real(), Some(0.0));
    }

    #[test]
    fn parses_complex_instances_and_typed_values() {
        let file = Parser::parse(
            wrap(
                "#7 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) );\n\
                 #8 = LENGTH_MEASURE_WITH_UNIT(LENGTH_MEASURE(25.4), #7);",
            )
            .as_bytes(),
        )
        .unwrap();
        let unit = file.get(7).unwrap();
        assert_eq!(unit.type_name(), None);
        assert_eq!(unit.describe(), "(LENGTH_UNIT NAMED_UNIT SI_UNIT)");
        let si = unit.record("SI_UNIT").unwrap();
        assert_eq!(si.args[0].as_enum(), Some("MILLI"));

        let measure = &file.get(8).unwrap().records[0];
        assert_eq!(measure.args[0].as_real(), Some(25.4));
        assert_eq!(measure.args[1].as_entity_ref(), Some(7));
    }

    #[test]
    fn null_derived_and_logical_values() {
        let file = Parser::parse(wrap("#1 = ORIENTED_EDGE('', *, *, #2, .T.);\n#3 = X($);").as_bytes())
            .unwrap();
        let args = &file.get(1).unwrap().records[0].args;
        assert_eq!(args[1], StepValue::Derived);
        assert_eq!(args[4].as_bool(), Some(true));
        assert!(file.get(3).unwrap().records[0].args[0].is_null());
    }

    #[test]
    fn instances_of_iterates_in_id_order() {
        let file = Parser::parse(
            wrap("#30 = PLANE('', #1);\n#4 = PLANE('', #1);\n#12 = LINE('', #1, #2);").as_bytes(),
        )
        .unwrap();
        let ids: Vec<u64> = file.instances_of(&["PLANE"]).map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 30]);
    }

    #[test]
    fn rejects_truncated_files() {
        assert!(Parser::parse(b"ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1 = LINE(").is_err());
        assert!(Parser::parse(b"not a step file").is_err());
        assert!(Parser::parse(b"").is_err());
    }
}
