use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use schedule_cell::models::{OrganizationBlock, ScheduleError, WorkShift};
use schedule_cell::services::availability::{AvailabilityService, BusySource};
use schedule_cell::services::interval::TimeRange;
use schedule_cell::store::MemoryScheduleStore;

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

#[derive(Default)]
struct FixedBusy {
    entries: Mutex<Vec<(Uuid, TimeRange)>>,
}

impl FixedBusy {
    fn occupy(&self, employee_id: Uuid, range: TimeRange) {
        self.entries.lock().unwrap().push((employee_id, range));
    }
}

#[async_trait]
impl BusySource for FixedBusy {
    async fn busy_intervals(
        &self,
        _organization_id: Uuid,
        employee_id: Uuid,
        _date: NaiveDate,
        _exclude_appointment: Option<Uuid>,
    ) -> Result<Vec<TimeRange>, ScheduleError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == employee_id)
            .map(|(_, range)| *range)
            .collect())
    }
}

struct Setup {
    availability: AvailabilityService,
    schedules: Arc<MemoryScheduleStore>,
    busy: Arc<FixedBusy>,
    org: Uuid,
    employee: Uuid,
    service: Uuid,
}

/// Monday 2026-03-02 with shifts 08:00-12:00 and 14:00-18:00, one 60-minute
/// service, 15-minute granularity.
fn monday_setup() -> Setup {
    let schedules = Arc::new(MemoryScheduleStore::new());
    let busy = Arc::new(FixedBusy::default());
    let org = Uuid::new_v4();
    let employee = Uuid::new_v4();
    let service = Uuid::new_v4();

    schedules.add_employee(org, employee);
    schedules.add_service(org, service, 60);
    for (start, end) in [(8, 12), (14, 18)] {
        schedules.add_shift(WorkShift {
            id: Uuid::new_v4(),
            organization_id: org,
            employee_id: employee,
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            active: true,
        });
    }

    let availability = AvailabilityService::new(
        schedules.clone(),
        schedules.clone(),
        busy.clone(),
        15,
    );

    Setup {
        availability,
        schedules,
        busy,
        org,
        employee,
        service,
    }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

// ==============================================================================
// TESTS
// ==============================================================================

#[tokio::test]
async fn two_shift_monday_emits_candidates_to_the_block_edges() {
    let setup = monday_setup();

    let slots = setup
        .availability
        .compute(setup.org, &[setup.employee], &[setup.service], monday(), None)
        .await
        .unwrap();

    assert_eq!(slots.first(), Some(&at(8, 0)));
    assert!(slots.contains(&at(11, 0)));
    assert!(!slots.contains(&at(11, 15)));
    assert!(!slots.contains(&at(12, 0)));
    assert!(slots.contains(&at(14, 0)));
    assert_eq!(slots.last(), Some(&at(17, 0)));
    assert_eq!(slots.len(), 26);
}

#[tokio::test]
async fn busy_appointment_removes_overlapping_candidates() {
    let setup = monday_setup();
    setup.busy.occupy(
        setup.employee,
        TimeRange::new(at(9, 0), at(10, 0)).unwrap(),
    );

    let slots = setup
        .availability
        .compute(setup.org, &[setup.employee], &[setup.service], monday(), None)
        .await
        .unwrap();

    // Any 60-minute window overlapping 09:00-10:00 is gone.
    for blocked in [at(8, 15), at(8, 30), at(8, 45), at(9, 0), at(9, 30)] {
        assert!(!slots.contains(&blocked), "{} should be excluded", blocked);
    }
    assert!(slots.contains(&at(8, 0)));
    assert!(slots.contains(&at(10, 0)));
}

#[tokio::test]
async fn organization_block_wipes_the_whole_day() {
    let setup = monday_setup();
    setup.schedules.add_block(OrganizationBlock {
        id: Uuid::new_v4(),
        organization_id: setup.org,
        starts_on: monday(),
        ends_on: monday(),
        active: true,
        reason: Some("holiday".to_string()),
    });

    let slots = setup
        .availability
        .compute(setup.org, &[setup.employee], &[setup.service], monday(), None)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn inactive_block_does_not_close_the_day() {
    let setup = monday_setup();
    setup.schedules.add_block(OrganizationBlock {
        id: Uuid::new_v4(),
        organization_id: setup.org,
        starts_on: monday(),
        ends_on: monday(),
        active: false,
        reason: None,
    });

    let slots = setup
        .availability
        .compute(setup.org, &[setup.employee], &[setup.service], monday(), None)
        .await
        .unwrap();

    assert!(!slots.is_empty());
}

#[tokio::test]
async fn joint_availability_intersects_across_employees() {
    let setup = monday_setup();

    // Second employee only works 10:00-12:00 on Mondays.
    let second = Uuid::new_v4();
    setup.schedules.add_employee(setup.org, second);
    setup.schedules.add_shift(WorkShift {
        id: Uuid::new_v4(),
        organization_id: setup.org,
        employee_id: second,
        day_of_week: 1,
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        active: true,
    });

    let slots = setup
        .availability
        .compute(
            setup.org,
            &[setup.employee, second],
            &[setup.service],
            monday(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(slots, vec![at(10, 0), at(10, 15), at(10, 30), at(10, 45), at(11, 0)]);
}

#[tokio::test]
async fn preferred_window_narrows_the_candidates() {
    let setup = monday_setup();

    let slots = setup
        .availability
        .compute(
            setup.org,
            &[setup.employee],
            &[setup.service],
            monday(),
            Some((
                NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            )),
        )
        .await
        .unwrap();

    assert_eq!(slots, vec![at(14, 0), at(14, 15), at(14, 30), at(14, 45), at(15, 0)]);
}

#[tokio::test]
async fn no_schedule_for_the_weekday_yields_empty_not_error() {
    let setup = monday_setup();
    let sunday = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

    let slots = setup
        .availability
        .compute(setup.org, &[setup.employee], &[setup.service], sunday, None)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn unknown_employee_is_not_found() {
    let setup = monday_setup();

    let result = setup
        .availability
        .compute(setup.org, &[Uuid::new_v4()], &[setup.service], monday(), None)
        .await;

    assert_matches!(result, Err(ScheduleError::EmployeeNotFound));
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let setup = monday_setup();

    let result = setup
        .availability
        .compute(setup.org, &[setup.employee], &[Uuid::new_v4()], monday(), None)
        .await;

    assert_matches!(result, Err(ScheduleError::ServiceNotFound));
}

#[tokio::test]
async fn empty_service_list_is_rejected() {
    let setup = monday_setup();

    let result = setup
        .availability
        .compute(setup.org, &[setup.employee], &[], monday(), None)
        .await;

    assert_matches!(result, Err(ScheduleError::InvalidRequest(_)));
}
