use super::identity::{Identity, Performer, ReleaseFlag};
use super::{ResolveError, Resolver};
use crate::config::NameMode;
use chrono::NaiveDate;

/// `STUDIO.YY.MM.DD.First.Last[.and.First.Last][.Part.N].EXT`
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictFormatResolver;

impl Resolver for StrictFormatResolver {
    fn mode(&self) -> NameMode {
        NameMode::StrictFormat
    }

    fn resolve(&self, input: &str) -> Result<Identity, ResolveError> {
        let name = input.trim();
        let Some((stem, extension)) = name.rsplit_once('.') else {
            return Err(ResolveError::unparsable(name, "缺少副檔名"));
        };
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ResolveError::unparsable(name, "副檔名不正確"));
        }

        let mut flags = Vec::new();
        let mut tokens = Vec::new();
        for token in stem.split('.') {
            match ReleaseFlag::from_token(token) {
                Some(flag) => {
                    if !flags.contains(&flag) {
                        flags.push(flag);
                    }
                }
                None => tokens.push(token),
            }
        }

        if tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(ResolveError::unparsable(name, "含有空白區段"));
        }
        if tokens.len() < 6 {
            return Err(ResolveError::unparsable(name, "區段數量不足"));
        }

        let studio = tokens[0].to_string();
        let release_date = parse_date(tokens[1], tokens[2], tokens[3])
            .ok_or_else(|| ResolveError::unparsable(name, "日期不正確"))?;

        let mut rest = &tokens[4..];
        let mut part = None;
        if let [head @ .., marker, number] = rest
            && marker.eq_ignore_ascii_case("part")
        {
            let value = number
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ResolveError::unparsable(name, "分段編號不正確"))?;
            part = Some(value);
            rest = head;
        }

        let performers = parse_performers(rest)
            .ok_or_else(|| ResolveError::unparsable(name, "演員區段必須是成對的名與姓"))?;

        let mut identity = Identity {
            studio: Some(studio),
            release_date: Some(release_date),
            performers,
            part,
            flags,
            query: String::new(),
        };
        identity.query = identity.canonical_name();
        Ok(identity)
    }
}

fn parse_date(yy: &str, mm: &str, dd: &str) -> Option<NaiveDate> {
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());
    if !(two_digits(yy) && two_digits(mm) && two_digits(dd)) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        2000 + yy.parse::<i32>().ok()?,
        mm.parse().ok()?,
        dd.parse().ok()?,
    )
}

/// 以 `and` 分隔，每組必須剛好是名與姓兩段
fn parse_performers(tokens: &[&str]) -> Option<Vec<Performer>> {
    if tokens.is_empty() {
        return None;
    }
    tokens
        .split(|t| t.eq_ignore_ascii_case("and"))
        .map(|group| match group {
            [first, last] => Some(Performer::new(first, last)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Result<Identity, ResolveError> {
        StrictFormatResolver.resolve(name)
    }

    #[test]
    fn test_single_performer() {
        let identity = resolve("Studio.24.01.02.Jane.Doe.mp4").unwrap();
        assert_eq!(identity.studio.as_deref(), Some("Studio"));
        assert_eq!(identity.release_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(identity.performers, vec![Performer::new("Jane", "Doe")]);
        assert_eq!(identity.part, None);
        assert_eq!(identity.query, "Studio.24.01.02.Jane.Doe");
    }

    #[test]
    fn test_multiple_performers_and_part() {
        let identity = resolve("Studio.23.12.31.Jane.Doe.and.John.Roe.Part.3.mkv").unwrap();
        assert_eq!(
            identity.performers,
            vec![Performer::new("Jane", "Doe"), Performer::new("John", "Roe")]
        );
        assert_eq!(identity.part, Some(3));
    }

    #[test]
    fn test_flags_are_stripped() {
        let identity = resolve("Studio.24.01.02.Jane.Doe.POV.Upscaled.mp4").unwrap();
        assert_eq!(identity.flags, vec![ReleaseFlag::Pov, ReleaseFlag::Upscaled]);
        assert_eq!(identity.performers, vec![Performer::new("Jane", "Doe")]);
        assert_eq!(identity.release_suffix(), Some("Upscaled"));
    }

    #[test]
    fn test_canonical_round_trip() {
        for name in [
            "Studio.24.01.02.Jane.Doe.mp4",
            "Studio.23.12.31.Jane.Doe.and.John.Roe.Part.3.mkv",
            "Brand-X.20.02.29.A.B.and.C.D.and.E.F.mp4",
        ] {
            let identity = resolve(name).unwrap();
            let again = resolve(&format!("{}.mp4", identity.canonical_name())).unwrap();
            assert_eq!(again.canonical_name(), identity.canonical_name());
            assert_eq!(again.performers, identity.performers);
            assert_eq!(again.release_date, identity.release_date);
            assert_eq!(again.part, identity.part);
        }
    }

    #[test]
    fn test_unparsable_names() {
        for name in [
            "randomfile.mp4",
            "Studio.24.01.02.mp4",
            "Studio.24.01.02.Jane.mp4",
            "Studio.24.01.02.Jane.Doe.Smith.mp4",
            "Studio.24.13.02.Jane.Doe.mp4",
            "Studio.24.02.30.Jane.Doe.mp4",
            "Studio.2024.01.02.Jane.Doe.mp4",
            "Studio.24.01.02.Jane.Doe.and.mp4",
            "Studio.24.01.02.Jane.Doe.Part.x.mp4",
            "Studio.24.01.02.Jane.Doe.Part.0.mp4",
            "Studio..24.01.02.Jane.Doe.mp4",
            "Studio.24.01.02.Jane.Doe",
        ] {
            assert!(
                matches!(resolve(name), Err(ResolveError::UnparsableName { .. })),
                "{name} 應該解析失敗"
            );
        }
    }
}
