use super::*;

#[test]
fn parses_scrape_with_query_only() {
    let cli = Cli::try_parse_from(["gmaps-cli", "scrape", "--query", "coffee in Berlin"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Scrape {
            ref query,
            max_places: None,
            lang: None,
            headed: false,
        } if query == "coffee in Berlin"
    ));
}

#[test]
fn parses_scrape_with_all_options() {
    let cli = Cli::try_parse_from([
        "gmaps-cli",
        "scrape",
        "-q",
        "Bäckerei in Köln",
        "--max-places",
        "10",
        "--lang",
        "de",
        "--headed",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Scrape {
            max_places: Some(10),
            lang: Some(ref lang),
            headed: true,
            ..
        } if lang == "de"
    ));
}

#[test]
fn scrape_requires_query() {
    assert!(Cli::try_parse_from(["gmaps-cli", "scrape"]).is_err());
}

#[test]
fn max_places_must_be_a_number() {
    assert!(
        Cli::try_parse_from(["gmaps-cli", "scrape", "-q", "x", "--max-places", "ten"]).is_err()
    );
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["gmaps-cli"]).is_err());
}
