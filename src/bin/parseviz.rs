use clap::{Arg, Command};
use color_eyre::eyre::{bail, Result, WrapErr};
use parseviz::fa::FA;
use parseviz::regex::to_postfix;
use parseviz::scanner::default_rules;
use parseviz::{compile_recognizer_strict, construct_dfa, construct_nfa, Pda, TokenKind, Tokenizer};
use std::fs;
use std::path::PathBuf;

const DEFAULT_SOURCE: &str = "x = 10 + 20";

const ABOUT: &str = "Compiles regular expressions to automata, tokenizes with them and replays an \
                     LL(1) parse one step at a time";

fn print_table<T: FA>(name: &str, fa: &T) {
    println!(
        "{} ({} states, start {})",
        name,
        fa.get_num_states(),
        fa.get_start_state()
    );
    for state in fa.get_states() {
        let marker = if state.is_final() { "*" } else { " " };
        let transitions: Vec<String> = state
            .get_transitions()
            .iter()
            .map(|transition| format!("{} -> {}", transition.get_symbol(), transition.get_target()))
            .collect();
        println!("  {}{:>3}  {}", marker, state.get_id(), transitions.join(", "));
    }
}

fn regex_playground(pattern: &str, dot: Option<&str>, strict: bool, json: bool) -> Result<()> {
    let postfix = to_postfix(pattern);
    let nfa = construct_nfa(&postfix);

    let dfa = if strict {
        compile_recognizer_strict(pattern, TokenKind::Identifier)?
    } else {
        construct_dfa(&nfa, TokenKind::Identifier)
    };

    if let Some(which) = dot {
        let dot = if which.eq_ignore_ascii_case("nfa") {
            nfa.to_dot()
        } else if which.eq_ignore_ascii_case("dfa") {
            dfa.to_dot()
        } else {
            bail!("--dot should be one of NFA | DFA");
        };
        println!("{}", dot);
        return Ok(());
    }

    if json {
        let output = serde_json::json!({
            "pattern": pattern,
            "postfix": postfix.to_string(),
            "warnings": postfix.get_warnings(),
            "nfa": nfa,
            "dfa": dfa,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("pattern: {}", pattern);
    println!("postfix: {}", postfix);
    for warning in nfa.get_warnings() {
        println!("{}", warning);
    }
    print_table("NFA", &nfa);
    print_table("DFA", &dfa);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Command::new("parseviz")
        .version("0.1")
        .about(ABOUT)
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("TEXT")
                .help("Source text to tokenize and parse")
                .value_parser(clap::value_parser!(String))
                .conflicts_with("input"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("INPUT SOURCE FILE")
                .help("Read the source text from a file instead")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("regex")
                .short('r')
                .long("regex")
                .value_name("PATTERN")
                .help("Compile a single pattern and print its NFA and DFA instead of parsing")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("dot")
                .short('d')
                .long("dot")
                .value_name("NFA, DFA")
                .help("With --regex, print the chosen automaton in Graphviz DOT format")
                .value_parser(clap::value_parser!(String))
                .requires("regex"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Reject malformed patterns instead of recovering from them")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("steps")
                .long("steps")
                .help("Print every step of the pushdown parse")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let strict = args.get_flag("strict");
    let json = args.get_flag("json");

    if let Some(pattern) = args.get_one::<String>("regex") {
        let dot = args.get_one::<String>("dot").map(|which| which.as_str());
        return regex_playground(pattern, dot, strict, json);
    }

    let source = match (
        args.get_one::<String>("source"),
        args.get_one::<PathBuf>("input"),
    ) {
        (Some(source), _) => source.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read the input source file {:?}", path))?,
        (None, None) => DEFAULT_SOURCE.to_string(),
    };

    let tokenizer = if strict {
        let mut tokenizer = Tokenizer::new();
        for (pattern, kind) in default_rules() {
            tokenizer.add_rule_strict(&pattern, kind)?;
        }
        tokenizer
    } else {
        Tokenizer::with_default_rules()
    };

    let tokens = tokenizer.tokenize(&source);

    let mut pda = Pda::new();
    pda.load_input(tokens.clone());
    let status = pda.run();

    if json {
        let output = serde_json::json!({
            "source": source,
            "tokens": tokens,
            "status": status,
            "error": pda.error().map(|error| error.to_string()),
            "history": pda.get_history(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{:<12} {:<10} {:>5} {:>5}", "KIND", "TEXT", "LINE", "POS");
    for token in &tokens {
        println!(
            "{:<12} {:<10} {:>5} {:>5}",
            token.get_kind().to_string(),
            format!("{:?}", token.get_text()),
            token.get_line(),
            token.get_position()
        );
    }
    println!();

    if args.get_flag("steps") {
        for (index, step) in pda.get_history().iter().enumerate() {
            println!("{:>4}  {}", index, step);
        }
        println!();
    }

    match pda.error() {
        Some(error) => println!("{}: {}", status, error),
        None => println!("{}", status),
    }

    Ok(())
}

#[cfg(test)]
mod parseviz_tests {
    use super::*;

    #[test]
    fn test_default_source_parses() {
        let tokens = Tokenizer::with_default_rules().tokenize(DEFAULT_SOURCE);
        let mut pda = Pda::new();
        pda.load_input(tokens);
        assert!(pda.run() == parseviz::PdaStatus::Accepted);
    }

    #[test]
    fn test_default_rules_are_well_formed() {
        for (pattern, kind) in default_rules() {
            assert!(compile_recognizer_strict(&pattern, kind).is_ok(), "{}", pattern);
        }
    }

    #[test]
    fn test_strict_recognizer_matches_lenient() {
        let strict = compile_recognizer_strict("(a|b)*c", TokenKind::Identifier).unwrap();
        let lenient = parseviz::compile_recognizer("(a|b)*c", TokenKind::Identifier);
        assert_eq!(strict, lenient);
    }
}
