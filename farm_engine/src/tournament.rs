/// Farm engine — Sports League
///
/// Roster management and the conference cycle:
///
///   idle -> selecting -> active -> finished -> idle
///
/// Creating a tournament fixes the player's strength, rolls opponent
/// strengths and shuffles every team into a single-elimination bracket.
/// Simulation resolves all rounds in one call; ending the cycle pays the
/// prize for the recorded placement and starts the cooldown.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::arithmetic::Millis;
use crate::domain::{
    Bracket, Conference, ConferenceStatus, GameState, MatchResult, NbaPlayer, OpponentTeam,
    PlayerPosition, PlayerStats, Tournament,
};
use crate::outcome::Rejection;
use crate::transitions::TransitionContext;

// ── Read-side ──────────────────────────────────────────────────────

/// Sum of stats, doubled for a C / PG / SG / F / F line-up.
pub fn team_strength(players: &[&NbaPlayer]) -> i64 {
    let base: i64 = players.iter().map(|p| p.stats.sum()).sum();
    let count = |pos: PlayerPosition| players.iter().filter(|p| p.position == pos).count();
    let balanced = players.len() == 5
        && count(PlayerPosition::Center) == 1
        && count(PlayerPosition::PointGuard) == 1
        && count(PlayerPosition::ShootingGuard) == 1
        && count(PlayerPosition::Forward) == 2;
    if balanced {
        base * 2
    } else {
        base
    }
}

/// Empty single-elimination bracket over `teams` (power of two).
pub fn build_bracket(teams: Vec<String>) -> Bracket {
    let mut bracket: Bracket = Vec::new();
    let mut width = teams.len();
    bracket.push(teams.into_iter().map(Some).collect());
    while width > 1 {
        width /= 2;
        bracket.push(vec![None; width]);
    }
    bracket
}

/// Placement band from the player's last match. Champion is 1, a final
/// loss is 2, an earlier loss in round r of R is 2^(R - r + 1). A player
/// who never played lands in the lowest band.
pub fn final_placement(tournament: &Tournament, player_team: &str) -> u32 {
    let rounds = tournament.bracket.len().saturating_sub(1) as u32;
    let lowest = 1u32 << rounds;
    let last = tournament
        .results
        .iter()
        .filter(|r| r.is_player_match)
        .max_by_key(|r| r.match_id);
    match last {
        None => lowest,
        Some(m) if m.winner == player_team => {
            if m.round >= rounds {
                1
            } else {
                1u32 << (rounds - m.round)
            }
        }
        Some(m) => 1u32 << (rounds - m.round.min(rounds) + 1),
    }
}

/// Whether the cooldown since the last conference has run out at `now`.
pub fn cooldown_elapsed(conference: &Conference, now: Millis, cooldown: Millis) -> bool {
    match conference.last_played {
        None => true,
        Some(last) => now.saturating_sub(last) >= cooldown,
    }
}

fn team_name(state: &GameState) -> Result<String, Rejection> {
    match state.nba_state.team_name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        _ => Err(Rejection::WrongPhase("team has no name")),
    }
}

fn require_status(state: &GameState, expected: ConferenceStatus) -> Result<(), Rejection> {
    if state.nba_state.conference.status != expected {
        return Err(Rejection::WrongPhase(match expected {
            ConferenceStatus::Idle => "conference is not idle",
            ConferenceStatus::Selecting => "conference is not selecting",
            ConferenceStatus::Active => "no active tournament",
            ConferenceStatus::Finished => "tournament not finished",
        }));
    }
    Ok(())
}

// ── Roster ─────────────────────────────────────────────────────────

pub(crate) fn apply_set_team_name(state: &mut GameState, name: &str) -> Result<(), Rejection> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Rejection::Invalid("team name is empty".to_string()));
    }
    state.nba_state.team_name = Some(name.to_string());
    Ok(())
}

pub(crate) fn apply_hire(
    state: &mut GameState,
    ctx: &TransitionContext,
    player: &NbaPlayer,
) -> Result<(), Rejection> {
    let tuning = &ctx.catalog.tuning;
    if state.nba_state.roster.len() >= tuning.nba_roster_limit {
        return Err(Rejection::CapReached("roster"));
    }
    if state.nba_state.roster.iter().any(|p| p.id == player.id) {
        return Err(Rejection::Invalid(format!("player {:?} already hired", player.id)));
    }
    state.spend(tuning.nba_player_cost)?;
    let clamp = |v: u32| v.clamp(tuning.min_player_stat, tuning.max_player_stat);
    state.nba_state.roster.push(NbaPlayer {
        stats: PlayerStats {
            shooting: clamp(player.stats.shooting),
            dunking: clamp(player.stats.dunking),
            dribbling: clamp(player.stats.dribbling),
        },
        ..player.clone()
    });
    Ok(())
}

pub(crate) fn apply_fire(state: &mut GameState, player_id: &str) -> Result<(), Rejection> {
    let roster = &mut state.nba_state.roster;
    let before = roster.len();
    roster.retain(|p| p.id != player_id);
    if roster.len() == before {
        return Err(Rejection::not_found("player", player_id));
    }
    Ok(())
}

// ── Conference cycle ───────────────────────────────────────────────

pub(crate) fn apply_set_conference_status(
    state: &mut GameState,
    ctx: &TransitionContext,
    status: ConferenceStatus,
) -> Result<(), Rejection> {
    let current = state.nba_state.conference.status;
    match (current, status) {
        (ConferenceStatus::Idle, ConferenceStatus::Selecting) => {
            team_name(state)?;
            let cooldown = ctx.catalog.tuning.nba_conference_cooldown_ms;
            if !cooldown_elapsed(&state.nba_state.conference, ctx.now, cooldown) {
                return Err(Rejection::WrongPhase("conference cooldown running"));
            }
        }
        (ConferenceStatus::Selecting, ConferenceStatus::Idle) => {}
        (a, b) if a == b => return Err(Rejection::NothingToDo),
        _ => return Err(Rejection::WrongPhase("status change not allowed")),
    }
    state.nba_state.conference.status = status;
    Ok(())
}

pub(crate) fn apply_create(
    state: &mut GameState,
    ctx: &mut TransitionContext,
    selected: &[String],
) -> Result<(), Rejection> {
    let catalog = ctx.catalog;
    let tuning = &catalog.tuning;
    require_status(state, ConferenceStatus::Selecting)?;
    let player_team = team_name(state)?;

    if selected.len() != tuning.nba_team_size {
        return Err(Rejection::Invalid(format!(
            "need {} players, got {}",
            tuning.nba_team_size,
            selected.len()
        )));
    }
    let mut line_up: Vec<&NbaPlayer> = Vec::with_capacity(selected.len());
    for id in selected {
        if line_up.iter().any(|p| &p.id == id) {
            return Err(Rejection::Invalid(format!("player {:?} selected twice", id)));
        }
        let player = state
            .nba_state
            .roster
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| Rejection::not_found("player", id))?;
        line_up.push(player);
    }
    let strength = team_strength(&line_up);

    if catalog.opponents.iter().any(|o| o == &player_team) {
        return Err(Rejection::Invalid(format!(
            "team name {:?} clashes with an opponent",
            player_team
        )));
    }
    let team_count = catalog.opponents.len() + 1;
    if !team_count.is_power_of_two() || team_count < 2 {
        return Err(Rejection::Invalid(format!(
            "bracket needs a power-of-two team count, got {}",
            team_count
        )));
    }

    let opponents: Vec<OpponentTeam> = catalog
        .opponents
        .iter()
        .map(|name| OpponentTeam {
            name: name.clone(),
            strength: ctx
                .rng
                .gen_range(tuning.opponent_strength_min..=tuning.opponent_strength_max),
        })
        .collect();

    let mut teams: Vec<String> = Vec::with_capacity(team_count);
    teams.push(player_team);
    teams.extend(opponents.iter().map(|o| o.name.clone()));
    teams.shuffle(&mut ctx.rng);

    let conference = &mut state.nba_state.conference;
    conference.tournament = Some(Tournament {
        bracket: build_bracket(teams),
        results: Vec::new(),
        player_team_strength: strength,
        opponents,
    });
    conference.status = ConferenceStatus::Active;
    conference.final_rank = None;
    Ok(())
}

/// Resolve one match from a uniform roll in `[0, 1)`. The stronger side
/// wins with `favourite_odds`; equal strengths are a coin flip.
pub fn first_side_wins(sa: i64, sb: i64, roll: f64, favourite_odds: f64) -> bool {
    match sa.cmp(&sb) {
        std::cmp::Ordering::Greater => roll < favourite_odds,
        std::cmp::Ordering::Less => roll >= favourite_odds,
        std::cmp::Ordering::Equal => roll < 0.5,
    }
}

pub(crate) fn apply_simulate(
    state: &mut GameState,
    ctx: &mut TransitionContext,
) -> Result<(), Rejection> {
    require_status(state, ConferenceStatus::Active)?;
    let player_team = team_name(state)?;
    let favourite_odds = ctx.catalog.tuning.favourite_win_probability;
    let tournament = state
        .nba_state
        .conference
        .tournament
        .as_mut()
        .ok_or(Rejection::WrongPhase("no active tournament"))?;

    let strength_of = |t: &Tournament, name: &str| -> i64 {
        if name == player_team {
            t.player_team_strength
        } else {
            t.opponents
                .iter()
                .find(|o| o.name == name)
                .map_or(0, |o| o.strength)
        }
    };

    let mut results = Vec::new();
    let mut match_id: u32 = 0;
    for round in 0..tournament.bracket.len().saturating_sub(1) {
        let entrants = tournament.bracket[round].clone();
        for (slot, pair) in entrants.chunks(2).enumerate() {
            let (a, b) = match pair {
                [Some(a), Some(b)] => (a.clone(), b.clone()),
                _ => return Err(Rejection::Invariant("bracket has an empty pairing".to_string())),
            };
            let (sa, sb) = (strength_of(tournament, &a), strength_of(tournament, &b));
            let roll = ctx.rng.gen::<f64>();
            let a_wins = first_side_wins(sa, sb, roll, favourite_odds);
            let winner = if a_wins { a.clone() } else { b.clone() };
            tournament.bracket[round + 1][slot] = Some(winner.clone());

            let player_side = if a == player_team {
                Some((sa, sb))
            } else if b == player_team {
                Some((sb, sa))
            } else {
                None
            };
            results.push(MatchResult {
                match_id,
                round: round as u32 + 1,
                teams: [a, b],
                winner,
                is_player_match: player_side.is_some(),
                player_team_strength: player_side.map(|(p, _)| p),
                opponent_team_strength: player_side.map(|(_, o)| o),
            });
            match_id += 1;
        }
    }
    tournament.results = results;
    let rank = final_placement(tournament, &player_team);

    let conference = &mut state.nba_state.conference;
    conference.final_rank = Some(rank);
    conference.status = ConferenceStatus::Finished;
    tracing::info!(rank, "tournament simulated");
    Ok(())
}

pub(crate) fn apply_end(state: &mut GameState, ctx: &TransitionContext) -> Result<(), Rejection> {
    require_status(state, ConferenceStatus::Finished)?;
    let rank = state
        .nba_state
        .conference
        .final_rank
        .ok_or(Rejection::WrongPhase("tournament not finished"))?;
    let prize = ctx.catalog.prizes.get(&rank).copied().unwrap_or(0);
    state.earn(prize)?;
    if rank == 1 {
        state.nba_state.trophies = state.nba_state.trophies.saturating_add(1);
    }
    state.nba_state.conference = Conference {
        last_played: Some(ctx.now),
        ..Conference::default()
    };
    tracing::info!(rank, prize, "conference closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::state::create_initial_state;

    #[test]
    fn test_match_roll_thresholds() {
        assert!(first_side_wins(100, 50, 0.79, 0.8));
        assert!(!first_side_wins(100, 50, 0.8, 0.8));
        assert!(!first_side_wins(50, 100, 0.79, 0.8));
        assert!(first_side_wins(50, 100, 0.8, 0.8));
        assert!(first_side_wins(70, 70, 0.49, 0.8));
        assert!(!first_side_wins(70, 70, 0.5, 0.8));
    }

    #[test]
    fn test_match_win_rates_follow_strength() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let odds = Catalog::standard().tuning.favourite_win_probability;
        let trials = 20_000;
        let rate = |sa: i64, sb: i64, seed: u64| -> f64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let wins = (0..trials)
                .filter(|_| first_side_wins(sa, sb, rng.gen::<f64>(), odds))
                .count();
            wins as f64 / trials as f64
        };

        let favourite = rate(150, 60, 1);
        let underdog = rate(60, 150, 2);
        let even = rate(90, 90, 3);
        assert!((favourite - 0.8).abs() < 0.02, "favourite won {}", favourite);
        assert!((underdog - 0.2).abs() < 0.02, "underdog won {}", underdog);
        assert!((even - 0.5).abs() < 0.02, "even match went {}", even);
    }

    fn player(id: &str, position: PlayerPosition, stat: u32) -> NbaPlayer {
        NbaPlayer {
            id: id.to_string(),
            name: format!("Player {}", id),
            position,
            stats: PlayerStats {
                shooting: stat,
                dunking: stat,
                dribbling: stat,
            },
        }
    }

    fn starting_five() -> Vec<NbaPlayer> {
        vec![
            player("c", PlayerPosition::Center, 5),
            player("pg", PlayerPosition::PointGuard, 5),
            player("sg", PlayerPosition::ShootingGuard, 5),
            player("f1", PlayerPosition::Forward, 5),
            player("f2", PlayerPosition::Forward, 5),
        ]
    }

    fn ready_state(catalog: &Catalog) -> GameState {
        let mut state = create_initial_state(catalog);
        state.nba_state.team_name = Some("Farmers".to_string());
        state.nba_state.roster = starting_five();
        state.nba_state.conference.status = ConferenceStatus::Selecting;
        state
    }

    fn ids() -> Vec<String> {
        ["c", "pg", "sg", "f1", "f2"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_balanced_lineup_doubles_strength() {
        let five = starting_five();
        let refs: Vec<&NbaPlayer> = five.iter().collect();
        assert_eq!(team_strength(&refs), 150);
        let mut lopsided = starting_five();
        lopsided[0].position = PlayerPosition::Forward;
        let refs: Vec<&NbaPlayer> = lopsided.iter().collect();
        assert_eq!(team_strength(&refs), 75);
    }

    #[test]
    fn test_bracket_shape() {
        let teams: Vec<String> = (0..16).map(|i| format!("t{}", i)).collect();
        let bracket = build_bracket(teams);
        let widths: Vec<usize> = bracket.iter().map(|r| r.len()).collect();
        assert_eq!(widths, vec![16, 8, 4, 2, 1]);
        assert!(bracket[1..].iter().flatten().all(Option::is_none));
    }

    #[test]
    fn test_full_tournament_sixteen_teams() {
        let catalog = Catalog::standard();
        let mut state = ready_state(&catalog);
        let mut ctx = TransitionContext::new(&catalog, 0, 9);
        apply_create(&mut state, &mut ctx, &ids()).unwrap();
        let t = state.nba_state.conference.tournament.as_ref().unwrap();
        assert_eq!(t.player_team_strength, 150);
        assert!(t.opponents.iter().all(|o| (40..=100).contains(&o.strength)));

        apply_simulate(&mut state, &mut ctx).unwrap();
        let conf = &state.nba_state.conference;
        let t = conf.tournament.as_ref().unwrap();
        assert_eq!(t.results.len(), 15);
        assert!(t.results.iter().all(|r| r.round <= 4));
        assert!(t.bracket[4][0].is_some());
        assert_eq!(conf.status, ConferenceStatus::Finished);
        let rank = conf.final_rank.unwrap();
        assert!([1, 2, 4, 8, 16].contains(&rank));
    }

    #[test]
    fn test_end_pays_prize_and_starts_cooldown() {
        let catalog = Catalog::standard();
        let mut state = ready_state(&catalog);
        state.nba_state.conference.status = ConferenceStatus::Finished;
        state.nba_state.conference.final_rank = Some(1);
        let before = state.money;
        let ctx = TransitionContext::new(&catalog, 5_000, 0);
        apply_end(&mut state, &ctx).unwrap();
        assert_eq!(state.money - before, 500_000_000);
        assert_eq!(state.nba_state.trophies, 1);
        assert_eq!(state.nba_state.conference.status, ConferenceStatus::Idle);
        assert_eq!(state.nba_state.conference.last_played, Some(5_000));

        let soon = TransitionContext::new(&catalog, 6_000, 0);
        assert_eq!(
            apply_set_conference_status(&mut state, &soon, ConferenceStatus::Selecting),
            Err(Rejection::WrongPhase("conference cooldown running"))
        );
        let later = TransitionContext::new(&catalog, 5_000 + 86_400_000, 0);
        apply_set_conference_status(&mut state, &later, ConferenceStatus::Selecting).unwrap();
    }

    #[test]
    fn test_placement_bands() {
        let mk = |round, winner: &str| MatchResult {
            match_id: round,
            round,
            teams: ["Farmers".to_string(), "Suns".to_string()],
            winner: winner.to_string(),
            is_player_match: true,
            player_team_strength: Some(1),
            opponent_team_strength: Some(1),
        };
        let mut t = Tournament {
            bracket: build_bracket((0..16).map(|i| i.to_string()).collect()),
            results: vec![],
            player_team_strength: 0,
            opponents: vec![],
        };
        assert_eq!(final_placement(&t, "Farmers"), 16);
        t.results = vec![mk(1, "Suns")];
        assert_eq!(final_placement(&t, "Farmers"), 16);
        t.results = vec![mk(1, "Farmers"), mk(2, "Farmers"), mk(3, "Suns")];
        assert_eq!(final_placement(&t, "Farmers"), 4);
        t.results = vec![mk(1, "Farmers"), mk(2, "Farmers"), mk(3, "Farmers"), mk(4, "Suns")];
        assert_eq!(final_placement(&t, "Farmers"), 2);
        t.results.last_mut().unwrap().winner = "Farmers".to_string();
        assert_eq!(final_placement(&t, "Farmers"), 1);
    }

    #[test]
    fn test_create_rejects_unknown_or_duplicate_players() {
        let catalog = Catalog::standard();
        let mut state = ready_state(&catalog);
        let mut ctx = TransitionContext::new(&catalog, 0, 0);
        let mut dup = ids();
        dup[4] = "c".to_string();
        assert!(apply_create(&mut state, &mut ctx, &dup).is_err());
        let mut ghost = ids();
        ghost[4] = "ghost".to_string();
        assert!(apply_create(&mut state, &mut ctx, &ghost).is_err());
        assert_eq!(state.nba_state.conference.status, ConferenceStatus::Selecting);
    }

    #[test]
    fn test_hire_clamps_stats_and_rejects_duplicates() {
        let catalog = Catalog::standard();
        let ctx = TransitionContext::new(&catalog, 0, 0);
        let mut state = create_initial_state(&catalog);
        state.money = 100_000_000;
        let mut rookie = player("r", PlayerPosition::Center, 9);
        rookie.stats.dunking = 0;
        apply_hire(&mut state, &ctx, &rookie).unwrap();
        let hired = &state.nba_state.roster[0];
        assert_eq!(hired.stats, PlayerStats { shooting: 5, dunking: 1, dribbling: 5 });
        assert_eq!(state.money, 90_000_000);
        assert!(apply_hire(&mut state, &ctx, &rookie).is_err());
        apply_fire(&mut state, "r").unwrap();
        assert!(apply_fire(&mut state, "r").is_err());
    }
}
