use strum::IntoDiscriminant;

use crate::ast::{
    DatasetDefStatement, Keyword, ParseToken, ProcStepStatement, ReadFileStatement,
    ReadSourceStatement, Statement, Token, TokenType,
};
use crate::scanner::Scanner;
use crate::warning::{Diagnostic, WarningKind};

/// Options of `SET`/`MERGE`/`UPDATE`/`MODIFY` that are never dataset names.
const READ_SOURCE_OPTIONS: [&str; 9] = [
    "end", "nobs", "point", "key", "indsname", "curobs", "open", "unique", "keyreset",
];

/// Procedure options whose value is a dataset the step reads.
const PROC_INPUT_OPTIONS: [&str; 1] = ["data"];

/// Procedure options whose value is a dataset the step writes.
const PROC_OUTPUT_OPTIONS: [&str; 2] = ["out", "base"];

fn is_read_source_option(ident: &str) -> bool {
    READ_SOURCE_OPTIONS
        .iter()
        .any(|opt| opt.eq_ignore_ascii_case(ident))
}

pub struct Parser<'a> {
    source_tokens: &'a [Token],
    curr: usize,
    eof: Token,
    diagnostics: Vec<Diagnostic>,
    open_proc: Option<ProcStepStatement>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        let (line, col) = tokens.last().map_or((1, 1), |tok| (tok.line, tok.col));
        Self {
            source_tokens: tokens,
            curr: 0,
            eof: Token {
                kind: TokenType::Eof,
                lexeme: String::from("eof"),
                line,
                col,
            },
            diagnostics: vec![],
            open_proc: None,
        }
    }

    pub fn diagnostics(&self) -> &Vec<Diagnostic> {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn peek(&self) -> &Token {
        self.source_tokens.get(self.curr).unwrap_or(&self.eof)
    }

    fn peek_next_i(&self, i: usize) -> &Token {
        self.source_tokens.get(self.curr + i).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            // Do not advance if we peek Eof
            self.curr += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn is_at_statement_end(&self) -> bool {
        self.is_at_end() || self.check_punct(';')
    }

    fn check_punct(&self, c: char) -> bool {
        self.peek().is_punct(c)
    }

    fn match_punct(&mut self, c: char) -> bool {
        if self.check_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn warn(&mut self, token: &Token, message: &str) {
        self.diagnostics.push(Diagnostic::new(
            WarningKind::Parse,
            token.line,
            token.col,
            format!("at '{}': {}", token.lexeme, message),
        ));
    }

    /// Skips to just past the statement separator.
    fn synchronize(&mut self) {
        while !self.is_at_statement_end() {
            self.advance();
        }
        self.match_punct(';');
    }

    /// Skips a parenthesized group, nested groups included. Returns false
    /// if the statement ended before the group was closed.
    fn skip_parenthesized(&mut self) -> bool {
        let open = self.advance();
        let mut depth = 1;
        while depth > 0 {
            if self.is_at_statement_end() {
                self.warn(&open, "Unclosed parenthesis in statement options.");
                return false;
            }
            let token = self.advance();
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            }
        }
        true
    }

    // program -> (statement? ";")*
    pub fn parse(&mut self) -> Vec<Statement> {
        let mut statements = vec![];
        loop {
            if self.is_at_end() {
                break;
            }
            if self.match_punct(';') {
                // Empty statement
                continue;
            }

            if self.open_proc.is_some() {
                match self.peek().keyword() {
                    Some(kw) if kw.ends_step() => {
                        if let Some(step) = self.open_proc.take() {
                            statements.push(Statement::ProcStep(step));
                        }
                        self.synchronize();
                        statements.push(Statement::Other);
                        continue;
                    }
                    Some(Keyword::Data) | Some(Keyword::Proc) => {
                        if let Some(step) = self.open_proc.take() {
                            statements.push(Statement::ProcStep(step));
                        }
                    }
                    _ => {
                        self.parse_proc_options();
                        self.synchronize();
                        statements.push(Statement::Other);
                        continue;
                    }
                }
            }

            statements.push(self.parse_statement());
        }
        if let Some(step) = self.open_proc.take() {
            statements.push(Statement::ProcStep(step));
        }
        statements
    }

    fn parse_statement(&mut self) -> Statement {
        let statement = match self.peek().keyword() {
            Some(Keyword::Data) => self.parse_dataset_def_statement(),
            Some(kw) if kw.reads_datasets() => self.parse_read_source_statement(),
            Some(Keyword::Infile) => self.parse_read_file_statement(),
            Some(Keyword::Proc) => {
                self.parse_proc_statement();
                Statement::Other
            }
            _ => Statement::Other,
        };
        self.synchronize();
        statement
    }

    // dataset_def -> "DATA" identifier (identifier | "(" ... ")" | option)* ";"
    fn parse_dataset_def_statement(&mut self) -> Statement {
        let keyword = self.advance();
        if self.peek().identifier().is_some() {
            let name = ParseToken::from(&self.advance());
            Statement::DatasetDef(DatasetDefStatement { name })
        } else {
            self.warn(&keyword, "Expected dataset name after `DATA`.");
            Statement::Other
        }
    }

    // read_source -> ("SET" | "MERGE" | "UPDATE" | "MODIFY") (identifier | "(" ... ")" | option ["=" value])+ ";"
    fn parse_read_source_statement(&mut self) -> Statement {
        let keyword = self.advance();
        let mut names = vec![];
        let mut unexpected: Option<Token> = None;

        while !self.is_at_statement_end() {
            let peek = self.peek();
            if peek.is_punct('(') {
                if !self.skip_parenthesized() {
                    break;
                }
            } else if peek.is_punct(',') || peek.is_punct('/') {
                self.advance();
            } else if let Some(ident) = peek.identifier() {
                if is_read_source_option(ident) {
                    self.advance();
                    if self.match_punct('=') && !self.is_at_statement_end() {
                        self.advance();
                    }
                } else {
                    names.push(ParseToken::from(&self.advance()));
                }
            } else {
                let token = self.advance();
                unexpected.get_or_insert(token);
            }
        }

        if let Some(token) = unexpected {
            self.warn(
                &token,
                &format!("Ignored unexpected tokens in `{}` statement.", keyword.lexeme.to_uppercase()),
            );
        }

        if names.is_empty() {
            self.warn(
                &keyword,
                &format!("`{}` statement names no source dataset.", keyword.lexeme.to_uppercase()),
            );
            return Statement::Other;
        }
        Statement::ReadSource(ReadSourceStatement {
            keyword: ParseToken::from(&keyword),
            names,
        })
    }

    // read_file -> "INFILE" string option* ";"
    fn parse_read_file_statement(&mut self) -> Statement {
        let keyword = self.advance();
        if matches!(self.peek().kind, TokenType::String(_)) {
            let path = ParseToken::from(&self.advance());
            Statement::ReadFile(ReadFileStatement {
                keyword: ParseToken::from(&keyword),
                path,
            })
        } else {
            let token = self.peek().clone();
            let found = token.kind.discriminant();
            self.warn(
                &token,
                &format!("Expected quoted path after `INFILE`, found {}.", found.variant_str()),
            );
            Statement::Other
        }
    }

    // proc -> "PROC" identifier option* ";"
    fn parse_proc_statement(&mut self) {
        let keyword = self.advance();
        if self.peek().identifier().is_none() {
            self.warn(&keyword, "Expected procedure name after `PROC`.");
            return;
        }
        let procedure = ParseToken::from(&self.advance());
        self.open_proc = Some(ProcStepStatement {
            procedure,
            inputs: vec![],
            outputs: vec![],
        });
        self.parse_proc_options();
    }

    /// Collects `DATA=`, `OUT=` and `BASE=` dataset options up to the end of the statement.
    fn parse_proc_options(&mut self) {
        while !self.is_at_statement_end() {
            let option = self.advance();
            let name = match &option.kind {
                TokenType::Keyword(Keyword::Data) => "data",
                TokenType::Identifier(ident) => ident.as_str(),
                _ => continue,
            };
            let is_input = PROC_INPUT_OPTIONS
                .iter()
                .any(|opt| opt.eq_ignore_ascii_case(name));
            let is_output = PROC_OUTPUT_OPTIONS
                .iter()
                .any(|opt| opt.eq_ignore_ascii_case(name));
            if !(is_input || is_output) || !self.check_punct('=') {
                continue;
            }
            if self.peek_next_i(1).identifier().is_none() {
                let token = self.peek_next_i(1).clone();
                self.warn(
                    &token,
                    &format!("Expected dataset name after `{}=`.", name.to_uppercase()),
                );
                continue;
            }
            self.advance();
            let dataset = ParseToken::from(&self.advance());
            if let Some(step) = self.open_proc.as_mut() {
                if is_input {
                    step.inputs.push(dataset);
                } else {
                    step.outputs.push(dataset);
                }
            }
        }
    }
}

/// Parses a token sequence into statements. Never fails: malformed statements
/// are skipped and reported through the returned diagnostics.
pub fn parse(tokens: &[Token]) -> (Vec<Statement>, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    (statements, parser.into_diagnostics())
}

/// Scans and parses SAS source text, returning lex and parse diagnostics together.
pub fn parse_sas(text: &str) -> (Vec<Statement>, Vec<Diagnostic>) {
    log::debug!(
        "Parsing {}",
        text.chars().take(50).collect::<String>()
    );

    let mut scanner = Scanner::new(text);
    scanner.scan();
    let (tokens, mut diagnostics) = scanner.into_parts();

    log::debug!("Tokens:");
    tokens.iter().for_each(|tok| log::debug!("{:?}", tok));

    let (statements, parse_diagnostics) = parse(&tokens);
    log::debug!("Statements: {:?}", statements);
    diagnostics.extend(parse_diagnostics);
    (statements, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(statement: &Statement) -> Vec<&str> {
        match statement {
            Statement::ReadSource(read) => read.names.iter().map(|n| n.lexeme.as_str()).collect(),
            _ => panic!("Expected read-source statement, got {:?}", statement),
        }
    }

    #[test]
    fn dataset_def_takes_first_identifier() {
        let (statements, diagnostics) = parse_sas("data out1 out2(keep=a);");
        assert!(diagnostics.is_empty());
        match &statements[0] {
            Statement::DatasetDef(def) => assert_eq!(def.name.lexeme, "out1"),
            other => panic!("Unexpected statement {:?}", other),
        }
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn read_source_skips_options() {
        let (statements, diagnostics) =
            parse_sas("set a(where=(x > 1) rename=(b=c)) lib.b, c end=eof nobs=n key=idx / unique;");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(names(&statements[0]), vec!["a", "lib.b", "c"]);
    }

    #[test]
    fn option_keywords_are_case_insensitive() {
        let (statements, _) = parse_sas("MERGE a b END=last;");
        assert_eq!(names(&statements[0]), vec!["a", "b"]);
    }

    #[test]
    fn infile_without_quotes_warns() {
        let (statements, diagnostics) = parse_sas("infile rawref dlm=',';");
        assert_eq!(statements, vec![Statement::Other]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, WarningKind::Parse);
        assert_eq!(diagnostics[0].line, 1);
    }

    #[test]
    fn empty_read_source_warns() {
        let (statements, diagnostics) = parse_sas("data a;\nset;\n");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1], Statement::Other);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
    }

    #[test]
    fn unknown_statements_are_other() {
        let (statements, diagnostics) = parse_sas("x = 1; if y then z = 2; %let v = 3; run;");
        assert!(diagnostics.is_empty());
        assert!(statements.iter().all(|s| *s == Statement::Other));
        assert_eq!(statements.len(), 4);
    }

    #[test]
    fn proc_step_collects_inputs_and_outputs() {
        let text = "proc sort data=raw out=sorted(drop=x); by id; run;\n\
                    proc means data=sorted; var x; output out=stats mean=m; run;";
        let (statements, diagnostics) = parse_sas(text);
        assert!(diagnostics.is_empty());
        let steps: Vec<_> = statements
            .iter()
            .filter_map(|s| match s {
                Statement::ProcStep(step) => Some(step),
                _ => None,
            })
            .collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].procedure.lexeme, "sort");
        assert_eq!(steps[0].inputs[0].lexeme, "raw");
        assert_eq!(steps[0].outputs[0].lexeme, "sorted");
        assert_eq!(steps[1].inputs[0].lexeme, "sorted");
        assert_eq!(steps[1].outputs[0].lexeme, "stats");
    }

    #[test]
    fn data_step_keywords_inside_proc_are_not_statements() {
        let text = "proc sql; update t set a = 1; quit; data b; set c;";
        let (statements, _) = parse_sas(text);
        assert!(!statements.iter().any(|s| matches!(
            s,
            Statement::ReadSource(read) if read.names[0].lexeme == "t"
        )));
        assert!(matches!(statements.last(), Some(Statement::ReadSource(_))));
    }

    #[test]
    fn proc_closed_by_next_step() {
        let (statements, _) = parse_sas("proc sort data=a out=b; data c; set b;");
        assert!(matches!(statements[1], Statement::ProcStep(_)));
        assert!(matches!(statements[2], Statement::DatasetDef(_)));
    }

    #[test]
    fn parser_never_panics_without_eof() {
        let (statements, diagnostics) = parse(&[]);
        assert!(statements.is_empty());
        assert!(diagnostics.is_empty());
    }
}
