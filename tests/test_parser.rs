use saslineage::{
    ast::{Statement, TokenType},
    parser::{parse, parse_sas},
    scanner::{Scanner, tokenize},
    test_utils::{LINEAGE_TESTS_FILE, TestLineageData},
};

fn statement_kinds(sas: &str) -> Vec<&'static str> {
    let (statements, _) = parse_sas(sas);
    statements
        .iter()
        .map(|statement| match statement {
            Statement::DatasetDef(_) => "dataset_def",
            Statement::ReadSource(_) => "read_source",
            Statement::ReadFile(_) => "read_file",
            Statement::ProcStep(_) => "proc_step",
            Statement::Other => "other",
        })
        .collect()
}

#[test]
fn test_parsing_ignores_case() {
    let lineage_data_file =
        std::fs::read_to_string(LINEAGE_TESTS_FILE).expect("Cannot open lineage test cases");
    let test_lineage_data: TestLineageData =
        toml::from_str(&lineage_data_file).expect("Cannot parse test cases defined in toml");

    for test in test_lineage_data.tests {
        for file in &test.files {
            println!("Testing parsing for SAS: {}", &file.content);
            let kinds = statement_kinds(&file.content);
            assert_eq!(kinds, statement_kinds(&file.content.to_uppercase()));
            assert_eq!(kinds, statement_kinds(&file.content.to_lowercase()));
        }
    }
}

#[test]
fn test_malformed_input_does_not_abort() {
    let sas_inputs = [
        "",
        ";;;",
        "data",
        "data;",
        "set",
        "set (keep=a",
        "set a(keep=(b c);",
        "infile",
        "infile 'unterminated",
        "proc",
        "proc;",
        "proc sort data=;",
        "proc sort data=a out=",
        "/* open comment",
        "* comment without end",
        "\"",
        "'",
        "&",
        "&&&",
        "data a.; set ..b;",
        "\u{1F600} data a; set b;",
    ];
    for sas in sas_inputs {
        println!("Testing recovery for SAS: {:?}", sas);
        let mut scanner = Scanner::new(sas);
        scanner.scan();
        let tokens = scanner.tokens();
        assert_eq!(
            tokens.iter().filter(|tok| tok.kind == TokenType::Eof).count(),
            1
        );
        assert_eq!(tokens.last().map(|tok| &tok.kind), Some(&TokenType::Eof));
        let _ = parse(tokens);
    }
}

#[test]
fn test_statements_after_errors_still_parse() {
    let sas = r#"
        data;
        infile rawref;
        set (keep=a;
        data good;
        set fine;
    "#;
    let (statements, diagnostics) = parse_sas(sas);
    assert_eq!(diagnostics.len(), 4);
    assert!(matches!(statements[3], Statement::DatasetDef(_)));
    match &statements[4] {
        Statement::ReadSource(read) => assert_eq!(read.names[0].lexeme, "fine"),
        other => panic!("Unexpected statement {:?}", other),
    }
}

#[test]
fn test_tokens_track_positions() {
    let tokens = tokenize("data a;\n\tset b;");
    let positions: Vec<(u32, u32)> = tokens.iter().map(|tok| (tok.line, tok.col)).collect();
    assert_eq!(
        positions,
        vec![(1, 1), (1, 6), (1, 7), (2, 2), (2, 6), (2, 7), (2, 8)]
    );
}
