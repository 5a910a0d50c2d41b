use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants, EnumString};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    DatasetDef(DatasetDefStatement),
    ReadSource(ReadSourceStatement),
    ReadFile(ReadFileStatement),
    ProcStep(ProcStepStatement),
    Other,
}

/// `DATA name ...;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefStatement {
    pub name: ParseToken,
}

/// `SET|MERGE|UPDATE|MODIFY name ...;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadSourceStatement {
    pub keyword: ParseToken,
    pub names: Vec<ParseToken>,
}

/// `INFILE "path" ...;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadFileStatement {
    pub keyword: ParseToken,
    pub path: ParseToken,
}

/// A whole `PROC name ...; ... RUN;` step, reduced to its `DATA=` inputs and `OUT=` outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcStepStatement {
    pub procedure: ParseToken,
    pub inputs: Vec<ParseToken>,
    pub outputs: Vec<ParseToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseToken {
    pub lexeme: String,
    pub line: u32,
    pub col: u32,
}

impl From<&Token> for ParseToken {
    fn from(token: &Token) -> Self {
        let lexeme = match &token.kind {
            TokenType::String(s) => s.clone(),
            _ => token.lexeme.clone(),
        };
        ParseToken {
            lexeme,
            line: token.line,
            col: token.col,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Keyword {
    Data,
    Set,
    Merge,
    Update,
    Modify,
    Infile,
    Proc,
    Run,
    Quit,
}

impl Keyword {
    /// Data-step statements whose operands are datasets being read.
    pub fn reads_datasets(&self) -> bool {
        matches!(
            self,
            Keyword::Set | Keyword::Merge | Keyword::Update | Keyword::Modify
        )
    }

    pub fn ends_step(&self) -> bool {
        matches!(self, Keyword::Run | Keyword::Quit)
    }
}

#[derive(PartialEq, Clone, Debug, EnumDiscriminants, Serialize, Deserialize)]
#[strum_discriminants(name(TokenTypeVariant))]
pub enum TokenType {
    Keyword(Keyword),
    Identifier(String),
    String(String),
    Punct(char),
    Eof,
}

impl TokenTypeVariant {
    pub fn variant_str(&self) -> &str {
        match self {
            TokenTypeVariant::Keyword => "KEYWORD",
            TokenTypeVariant::Identifier => "IDENT",
            TokenTypeVariant::String => "STRING",
            TokenTypeVariant::Punct => "PUNCT",
            TokenTypeVariant::Eof => "EOF",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenType,
    pub lexeme: String,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenType::Punct(c)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenType::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    /// Identifier text, if this token can name a dataset.
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenType::Identifier(ident) => Some(ident),
            _ => None,
        }
    }
}
