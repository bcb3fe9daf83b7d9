use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Article(i64),
    Nearby { latitude: f64, longitude: f64 },
    Favorite(i64),
    Unfavorite(i64),
    Favorites,
    Recent(Option<usize>),
    Summarize(i64),
    Sync,
    Cleanup,
    Open(i64),
    Help,
}

pub const USAGE: &str = "\
Usage: wiki-pocket <command> [args]

Commands:
  search <query...>      Search articles (cached titles first)
  article <id>           Show an article, generating its AI summary if needed
  nearby <lat> <lon>     Articles near a coordinate
  favorite <id>          Mark an article as favorite
  unfavorite <id>        Remove an article from favorites
  favorites              List favorite articles
  recent [limit]         Recently viewed articles
  summarize <id>         Generate the AI summary for a cached article
  sync                   Refresh all favorites from Wikipedia
  cleanup                Evict stale cached articles
  open <id>              Open the article page in the browser
  help                   Show this message";

/// Parses the arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };

    let command = match name.as_str() {
        "search" => {
            let query = rest.join(" ");
            if query.trim().is_empty() {
                return Err(AppError::InvalidArgument("search needs a query".to_string()));
            }
            Command::Search(query)
        }
        "article" => Command::Article(parse_id(rest)?),
        "nearby" => match rest {
            [lat, lon] => Command::Nearby {
                latitude: parse_number(lat, "latitude")?,
                longitude: parse_number(lon, "longitude")?,
            },
            _ => {
                return Err(AppError::InvalidArgument(
                    "nearby needs <lat> <lon>".to_string(),
                ))
            }
        },
        "favorite" => Command::Favorite(parse_id(rest)?),
        "unfavorite" => Command::Unfavorite(parse_id(rest)?),
        "favorites" => Command::Favorites,
        "recent" => match rest.first() {
            Some(limit) => Command::Recent(Some(parse_number(limit, "limit")?)),
            None => Command::Recent(None),
        },
        "summarize" => Command::Summarize(parse_id(rest)?),
        "sync" => Command::Sync,
        "cleanup" => Command::Cleanup,
        "open" => Command::Open(parse_id(rest)?),
        "help" | "--help" | "-h" => Command::Help,
        other => {
            return Err(AppError::InvalidArgument(format!(
                "unknown command: {other}"
            )))
        }
    };

    Ok(command)
}

fn parse_id(rest: &[String]) -> Result<i64> {
    let raw = rest
        .first()
        .ok_or_else(|| AppError::InvalidArgument("missing article id".to_string()))?;
    parse_number(raw, "article id")
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidArgument(format!("invalid {what}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_args_shows_help() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Help);
    }

    #[test]
    fn search_joins_words() {
        assert_eq!(
            parse_args(&args(&["search", "Eiffel", "Tower"])).unwrap(),
            Command::Search("Eiffel Tower".to_string())
        );
        assert!(parse_args(&args(&["search"])).is_err());
    }

    #[test]
    fn id_commands_parse_numbers() {
        assert_eq!(parse_args(&args(&["article", "22989"])).unwrap(), Command::Article(22989));
        assert_eq!(parse_args(&args(&["favorite", "5"])).unwrap(), Command::Favorite(5));
        assert_eq!(parse_args(&args(&["unfavorite", "5"])).unwrap(), Command::Unfavorite(5));
        assert_eq!(parse_args(&args(&["open", "7"])).unwrap(), Command::Open(7));
        assert!(matches!(
            parse_args(&args(&["article", "paris"])),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(parse_args(&args(&["summarize"])).is_err());
    }

    #[test]
    fn nearby_needs_two_coordinates() {
        assert_eq!(
            parse_args(&args(&["nearby", "48.8584", "-2.2945"])).unwrap(),
            Command::Nearby {
                latitude: 48.8584,
                longitude: -2.2945
            }
        );
        assert!(parse_args(&args(&["nearby", "48.8"])).is_err());
    }

    #[test]
    fn recent_limit_is_optional() {
        assert_eq!(parse_args(&args(&["recent"])).unwrap(), Command::Recent(None));
        assert_eq!(parse_args(&args(&["recent", "3"])).unwrap(), Command::Recent(Some(3)));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}
