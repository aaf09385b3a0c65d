use roster_core::db::open_db_in_memory;
use roster_core::{
    ClearMode, Direction, FetchGraph, Member, MemberDto, MemberField, MemberFilter,
    MemberRepository, PageRequest, QueryHints, RepoError, Session, Sort, SqliteMemberRepository,
    SqliteTeamRepository, Team, TeamRepository,
};

fn save_team(session: &Session<'_>, name: &str) -> Team {
    SqliteTeamRepository::new(session)
        .save(Team::new(name))
        .unwrap()
}

fn save_member(repo: &SqliteMemberRepository<'_, '_>, username: &str, age: i32) -> Member {
    repo.save(Member::with_age(username, age)).unwrap()
}

fn save_member_in(
    repo: &SqliteMemberRepository<'_, '_>,
    username: &str,
    age: i32,
    team: &Team,
) -> Member {
    repo.save(Member::with_team(username, age, team).unwrap())
        .unwrap()
}

#[test]
fn save_and_find_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let saved = save_member(&repo, "memberA", 10);
    let id = saved.id.unwrap();
    session.flush().unwrap();
    session.clear();

    let loaded = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(loaded.username, "memberA");
    assert_eq!(loaded.age, 10);
    assert_eq!(loaded.team_id, None);
    assert_eq!(repo.count().unwrap(), 1);
    assert!(repo.find_by_id(id + 100).unwrap().is_none());
}

#[test]
fn save_merges_detached_member() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let mut detached = save_member(&repo, "memberA", 10);
    session.clear();
    detached.change_username("memberB");

    let merged = repo.save(detached).unwrap();
    assert_eq!(merged.username, "memberB");
    assert_eq!(session.flush().unwrap(), 1);

    session.clear();
    let reloaded = repo.find_by_id(merged.id.unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.username, "memberB");
}

#[test]
fn delete_by_id_removes_row_and_reports_missing_ids() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let id = save_member(&repo, "memberA", 10).id.unwrap();
    repo.delete_by_id(id).unwrap();

    assert!(repo.find_by_id(id).unwrap().is_none());
    assert_eq!(repo.count().unwrap(), 0);
    assert!(matches!(
        repo.delete_by_id(id),
        Err(RepoError::NotFound {
            entity: "member",
            ..
        })
    ));
}

#[test]
fn lookups_honor_declared_return_shapes() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    save_member(&repo, "AAA", 10);
    save_member(&repo, "BBB", 20);

    let list = repo.find_list_by_username("AAA").unwrap();
    assert_eq!(list.len(), 1);
    assert!(repo.find_list_by_username("missing").unwrap().is_empty());

    let single = repo.find_member_by_username("AAA").unwrap().unwrap();
    assert_eq!(single.age, 10);
    assert!(repo.find_member_by_username("missing").unwrap().is_none());

    let optional = repo.find_optional_by_username("BBB").unwrap();
    assert_eq!(optional.map(|member| member.age), Some(20));
}

#[test]
fn single_result_lookup_fails_on_duplicates() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    save_member(&repo, "AAA", 10);
    save_member(&repo, "AAA", 20);

    assert_eq!(repo.find_list_by_username("AAA").unwrap().len(), 2);
    assert!(matches!(
        repo.find_member_by_username("AAA"),
        Err(RepoError::NonUniqueResult { actual: 2 })
    ));
}

#[test]
fn member_dto_projection_includes_members_without_team() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let team = save_team(&session, "teamA");
    let with_team = save_member_in(&repo, "AAA", 10, &team);
    let without_team = save_member(&repo, "BBB", 20);

    let dtos = repo.find_member_dto().unwrap();
    assert_eq!(
        dtos,
        vec![
            MemberDto::new(with_team.id.unwrap(), "AAA", Some("teamA".to_string())),
            MemberDto::new(without_team.id.unwrap(), "BBB", None),
        ]
    );
}

#[test]
fn find_by_age_pages_with_username_descending() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    for username in ["member1", "member2", "member3", "member4", "member5"] {
        save_member(&repo, username, 10);
    }
    save_member(&repo, "member6", 20);

    let sort = Sort::by(Direction::Desc, MemberField::Username);
    let first = PageRequest::of_sorted(0, 3, sort).unwrap();
    let page = repo.find_by_age(10, &first).unwrap();

    let usernames: Vec<&str> = page
        .content()
        .iter()
        .map(|member| member.username.as_str())
        .collect();
    assert_eq!(usernames, vec!["member5", "member4", "member3"]);
    assert_eq!(page.number(), 0);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert!(page.is_first());
    assert!(page.has_next());

    let second = repo.find_by_age(10, &first.next()).unwrap();
    assert_eq!(second.number_of_elements(), 2);
    assert_eq!(second.number(), 1);
    assert_eq!(second.total_elements(), 5);
    assert!(second.is_last());
    assert!(!second.has_next());
}

#[test]
fn partial_last_page_skips_count_statement() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    for username in ["member1", "member2"] {
        save_member(&repo, username, 10);
    }

    let before = session.statement_count();
    let page = repo
        .find_by_age(10, &PageRequest::of(0, 3).unwrap())
        .unwrap();
    assert_eq!(page.total_elements(), 2);
    assert_eq!(session.statement_count() - before, 1);
}

#[test]
fn slice_reads_one_extra_row_instead_of_counting() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    for username in ["member1", "member2", "member3", "member4", "member5"] {
        save_member(&repo, username, 10);
    }

    let request = PageRequest::of_sorted(0, 3, Sort::by(Direction::Asc, MemberField::Username))
        .unwrap();
    let before = session.statement_count();
    let slice = repo.find_slice_by_age(10, &request).unwrap();
    assert_eq!(session.statement_count() - before, 1);
    assert_eq!(slice.number_of_elements(), 3);
    assert!(slice.has_next());

    let last = repo.find_slice_by_age(10, &request.next()).unwrap();
    assert_eq!(last.number_of_elements(), 2);
    assert!(!last.has_next());
}

#[test]
fn find_page_maps_entities_to_dtos_keeping_metadata() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let team = save_team(&session, "teamA");
    save_member_in(&repo, "member1", 10, &team);
    save_member_in(&repo, "member2", 20, &team);
    save_member(&repo, "member3", 30);

    let filter = MemberFilter::all().and_team_name("teamA");
    let page = repo
        .find_page(&filter, &PageRequest::of(0, 1).unwrap(), FetchGraph::team())
        .unwrap();
    let dtos = page.map(|member| MemberDto::new(member.id.unwrap(), member.username, None));

    assert_eq!(dtos.total_elements(), 2);
    assert_eq!(dtos.total_pages(), 2);
    assert_eq!(dtos.content()[0].username, "member1");
}

#[test]
fn bulk_update_leaves_context_stale_until_cleared() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    for (username, age) in [
        ("member1", 10),
        ("member2", 20),
        ("member3", 30),
        ("member4", 40),
        ("member5", 10),
    ] {
        save_member(&repo, username, age);
    }

    let affected = repo.bulk_age_plus(20, ClearMode::Keep).unwrap();
    assert_eq!(affected, 3);

    let stale = repo.find_member_by_username("member4").unwrap().unwrap();
    assert_eq!(stale.age, 40);

    session.clear();
    let ages: Vec<i32> = repo
        .find_by(
            &MemberFilter::all(),
            &Sort::by(Direction::Asc, MemberField::Username),
            FetchGraph::none(),
            QueryHints::default(),
        )
        .unwrap()
        .into_iter()
        .map(|member| member.age)
        .collect();
    assert_eq!(ages, vec![10, 21, 31, 41, 10]);
}

#[test]
fn bulk_update_with_automatic_clear_returns_fresh_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    save_member(&repo, "member1", 19);
    save_member(&repo, "member2", 40);

    let affected = repo
        .bulk_age_plus(20, ClearMode::ClearAutomatically)
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(session.managed_count(), 0);

    let fresh = repo.find_member_by_username("member2").unwrap().unwrap();
    assert_eq!(fresh.age, 41);
}

#[test]
fn bulk_update_flushes_pending_changes_first() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let id = save_member(&repo, "member1", 10).id.unwrap();
    session.update_member(id, |member| member.age = 25).unwrap();

    let affected = repo
        .bulk_age_plus(20, ClearMode::ClearAutomatically)
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(repo.find_by_id(id).unwrap().unwrap().age, 26);
}

#[test]
fn lazy_team_access_issues_one_statement_per_team() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let team_a = save_team(&session, "teamA");
    let team_b = save_team(&session, "teamB");
    save_member_in(&repo, "member1", 10, &team_a);
    save_member_in(&repo, "member2", 20, &team_b);
    session.flush().unwrap();
    session.clear();

    let before = session.statement_count();
    let members = repo.find_all(FetchGraph::none()).unwrap();
    assert_eq!(session.statement_count() - before, 1);

    let names: Vec<String> = members
        .iter()
        .map(|member| session.team_of(member).unwrap().unwrap().name)
        .collect();
    assert_eq!(names, vec!["teamA", "teamB"]);
    assert_eq!(session.statement_count() - before, 3);
}

#[test]
fn entity_graph_fetch_resolves_teams_without_extra_statements() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let team_a = save_team(&session, "teamA");
    let team_b = save_team(&session, "teamB");
    save_member_in(&repo, "member1", 10, &team_a);
    save_member_in(&repo, "member1", 20, &team_b);
    save_member(&repo, "member2", 30);
    session.flush().unwrap();
    session.clear();

    let before = session.statement_count();
    let members = repo.find_member_entity_graph().unwrap();
    let teams: Vec<Option<String>> = members
        .iter()
        .map(|member| session.team_of(member).unwrap().map(|team| team.name))
        .collect();
    assert_eq!(session.statement_count() - before, 1);
    assert_eq!(
        teams,
        vec![Some("teamA".to_string()), Some("teamB".to_string()), None]
    );

    session.clear();
    let before = session.statement_count();
    let by_name = repo.find_entity_graph_by_username("member1").unwrap();
    for member in &by_name {
        assert!(session.team_of(member).unwrap().is_some());
    }
    assert_eq!(by_name.len(), 2);
    assert_eq!(session.statement_count() - before, 1);
}

#[test]
fn read_only_lookup_is_never_written_back() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    save_member(&repo, "member1", 10);
    session.flush().unwrap();
    session.clear();

    let loaded = repo.find_read_only_by_username("member1").unwrap().unwrap();
    session
        .update_member(loaded.id.unwrap(), |member| member.change_username("member2"))
        .unwrap();
    assert_eq!(session.flush().unwrap(), 0);

    session.clear();
    assert!(repo.find_member_by_username("member1").unwrap().is_some());
    assert!(repo.find_member_by_username("member2").unwrap().is_none());
}

#[test]
fn custom_query_returns_all_members() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    save_member(&repo, "member1", 10);
    save_member(&repo, "member2", 20);

    let members = repo.find_member_custom().unwrap();
    let usernames: Vec<&str> = members
        .iter()
        .map(|member| member.username.as_str())
        .collect();
    assert_eq!(usernames, vec!["member1", "member2"]);
}

#[test]
fn find_by_filters_on_team_membership() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    let team = save_team(&session, "teamA");
    save_member_in(&repo, "member1", 10, &team);
    save_member(&repo, "member2", 20);
    save_member(&repo, "member3", 35);

    let teamless = repo
        .find_by(
            &MemberFilter::all().and_has_team(false).and_age_gte(30),
            &Sort::unsorted(),
            FetchGraph::none(),
            QueryHints::default(),
        )
        .unwrap();
    assert_eq!(teamless.len(), 1);
    assert_eq!(teamless[0].username, "member3");

    let members_of_team = SqliteTeamRepository::new(&session)
        .members_of(team.id.unwrap())
        .unwrap();
    assert_eq!(members_of_team.len(), 1);
    assert_eq!(members_of_team[0].username, "member1");
}

#[test]
fn invalid_member_is_rejected_before_insert() {
    let mut conn = open_db_in_memory().unwrap();
    let session = Session::begin(&mut conn).unwrap();
    let repo = SqliteMemberRepository::try_new(&session).unwrap();

    assert!(matches!(
        repo.save(Member::with_age("  ", 10)),
        Err(RepoError::Validation(_))
    ));
    assert!(matches!(
        repo.save(Member::with_age("member1", -1)),
        Err(RepoError::Validation(_))
    ));
    assert_eq!(repo.count().unwrap(), 0);
}
