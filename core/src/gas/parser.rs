use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, multispace0},
    combinator::{map, opt, value},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use crate::error::EngineError;
use crate::gas::{GasList, GasMix};

/// Parsed gas mix before validation: (o2, he, switch depth, travel).
type RawMix = (f64, f64, Option<f64>, bool);

/// Parse a single gas mix, i.e. `ean50@22` or `ean36 travel`.
pub fn parse_mix(input: &str) -> Result<GasMix, EngineError> {
    let (o2, he, depth, travel) = parse_complete(input, raw_mix)?;
    let mix = GasMix::new(depth.unwrap_or(0.0), o2, he)?;
    Ok(if travel { mix.as_travel() } else { mix })
}

/// Parse comma separated list of gas mixes, i.e. `air, ean50@22, o2@6`.
///
/// The switch depth ordering rules of [`GasList`] are enforced.
pub fn parse_gas_list(input: &str) -> Result<GasList, EngineError> {
    let mixes = parse_complete(input, |i| {
        separated_list1(ws(char(',')), raw_mix).parse(i)
    })?;

    let mut list = GasList::new();
    for (o2, he, depth, travel) in mixes {
        let depth = depth.unwrap_or(0.0);
        if travel {
            list.add_travel(depth, o2, he)?;
        } else {
            list.add_mix(depth, o2, he)?;
        }
    }
    Ok(list)
}

fn parse_complete<'a, O, F>(input: &'a str, mut parser: F) -> Result<O, EngineError>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    let input = input.trim();
    if input.is_empty() {
        return Err(EngineError::Parse {
            position: 0,
            message: "empty gas mix specification".to_string(),
        });
    }

    match parser(input) {
        Ok((remaining, output)) => {
            let remaining = remaining.trim();
            if remaining.is_empty() {
                Ok(output)
            } else {
                Err(EngineError::Parse {
                    position: input.len() - remaining.len(),
                    message: format!("unexpected characters: '{}'", remaining),
                })
            }
        }
        Err(e) => Err(EngineError::Parse {
            position: 0,
            message: format!("parse error: {:?}", e),
        }),
    }
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn raw_mix(input: &str) -> IResult<&str, RawMix> {
    let (input, (o2, he)) = ws(gas_name).parse(input)?;
    let (input, depth) = opt(preceded(ws(char('@')), ws(double))).parse(input)?;
    let (input, travel) = opt(ws(tag_no_case("travel"))).parse(input)?;
    Ok((input, (o2, he, depth, travel.is_some())))
}

fn gas_name(input: &str) -> IResult<&str, (f64, f64)> {
    alt((
        value((21.0, 0.0), tag_no_case("air")),
        value((100.0, 0.0), tag_no_case("o2")),
        map(preceded(tag_no_case("ean"), double), |o2: f64| (o2, 0.0)),
        map(pair(double, opt(preceded(char('/'), double))), |(o2, he): (f64, Option<f64>)| {
            (o2, he.unwrap_or(0.0))
        }),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_gases() {
        let air = parse_mix("air").unwrap();
        assert_eq!((air.o2, air.n2, air.he, air.depth), (21.0, 79.0, 0.0, 0.0));

        let o2 = parse_mix("O2@6").unwrap();
        assert_eq!((o2.o2, o2.n2, o2.depth), (100.0, 0.0, 6.0));

        let ean = parse_mix("EAN32").unwrap();
        assert_eq!((ean.o2, ean.n2), (32.0, 68.0));
    }

    #[test]
    fn test_parse_trimix() {
        let mix = parse_mix("21/35 @ 0").unwrap();
        assert_eq!(mix.o2, 21.0);
        assert_eq!(mix.he, 35.0);
        assert_eq!(mix.n2, 44.0);
    }

    #[test]
    fn test_parse_percentage_with_depth() {
        let mix = parse_mix("50@22").unwrap();
        assert_eq!(mix.o2, 50.0);
        assert_eq!(mix.depth, 22.0);
    }

    #[test]
    fn test_parse_gas_list() {
        let list = parse_gas_list("air, ean50@22, o2@6").unwrap();
        let depths: Vec<f64> = list.mixes().iter().map(|m| m.depth).collect();
        assert_eq!(depths, vec![0.0, 22.0, 6.0]);
    }

    #[test]
    fn test_parse_travel_gas() {
        let mix = parse_mix("ean36 travel").unwrap();
        assert!(mix.travel);
        assert_eq!((mix.o2, mix.depth), (36.0, 0.0));

        let list = parse_gas_list("36@0 travel, 13/50@33, 36@33, 50@21, 80@9").unwrap();
        assert_eq!(list.travel_mixes().len(), 1);
        assert_eq!(list.mixes().len(), 4);
        assert!(!parse_mix("air").unwrap().travel);
    }

    #[test]
    fn test_parse_gas_list_order_violation() {
        let err = parse_gas_list("air, ean50@22, ean80@24").unwrap_err();
        assert!(matches!(err, EngineError::GasOrder { depth, .. } if depth == 24.0));
    }

    #[test]
    fn test_parse_invalid_fractions() {
        let err = parse_mix("60/50").unwrap_err();
        assert!(matches!(err, EngineError::InvalidGasMix { .. }));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_mix(""),
            Err(EngineError::Parse { position: 0, .. })
        ));
        assert!(matches!(
            parse_mix("nitrogen"),
            Err(EngineError::Parse { .. })
        ));

        let err = parse_mix("air#").unwrap_err();
        assert!(matches!(err, EngineError::Parse { position: 3, .. }), "{err}");
    }
}
